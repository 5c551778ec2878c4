//! One job's event stream, kept alive across transient disconnects.
//!
//! A [`StreamSession`] owns a background task that runs
//! connect -> read -> close -> back off -> reconnect strictly in sequence,
//! so at most one connection is live at a time. Recognised messages are
//! dispatched to [`SessionCallbacks`]; malformed or unknown frames are
//! logged and dropped without touching the connection.
//!
//! [`StreamSession::disconnect`] is the only cancellation primitive. It
//! cancels a pending reconnect, closes the live connection and waits for
//! the task to finish, so no callback fires after it returns.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use studio_core::types::JobId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionCallbacks, RECONNECT_EXHAUSTED_MESSAGE};
use crate::messages::{parse_message, StreamMessage};
use crate::reconnect::ReconnectPolicy;
use crate::transport::{Connection, Transport};

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Handle to a running job stream.
///
/// Dropping the handle cancels the session without waiting for it.
pub struct StreamSession {
    job_id: JobId,
    state: watch::Receiver<ConnectionState>,
    attempts: Arc<AtomicU32>,
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Everything the session task needs, owned by the task.
struct SessionContext {
    job_id: JobId,
    url: String,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    callbacks: Arc<dyn SessionCallbacks>,
    state: watch::Sender<ConnectionState>,
    attempts: Arc<AtomicU32>,
    cancel: CancellationToken,
}

/// Why reading from a connection stopped.
enum ReadOutcome {
    Closed,
    Cancelled,
}

impl StreamSession {
    /// Spawn the session task. Use [`crate::client::StreamClient::connect`].
    pub(crate) fn spawn(
        job_id: JobId,
        url: String,
        transport: Arc<dyn Transport>,
        policy: ReconnectPolicy,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let ctx = SessionContext {
            job_id,
            url,
            transport,
            policy,
            callbacks,
            state: state_tx,
            attempts: Arc::clone(&attempts),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(async move {
            tracing::debug!(job_id, url = %ctx.url, "Starting stream session");
            run_session(ctx, outgoing_rx).await;
            tracing::debug!(job_id, "Stream session exited");
        });

        Self {
            job_id,
            state: state_rx,
            attempts,
            outgoing: outgoing_tx,
            cancel,
            task: Some(task),
        }
    }

    /// The job this session is bound to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// `true` while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    /// Reconnects since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Wait until the session reaches `target`. Returns `false` if the
    /// session task ended first without reaching it.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut state = self.state.clone();
        let reached = state.wait_for(|s| *s == target).await.is_ok();
        reached
    }

    /// Send a JSON payload on the open connection.
    ///
    /// Only transmits while the connection is open; otherwise logs a
    /// warning and drops the payload. Returns whether the frame was handed
    /// to the connection.
    pub fn send(&self, payload: &serde_json::Value) -> bool {
        if !self.is_connected() {
            tracing::warn!(job_id = self.job_id, "Cannot send: connection not open");
            return false;
        }
        self.outgoing.send(payload.to_string()).is_ok()
    }

    /// Stop the session: cancel any pending reconnect, close the live
    /// connection, and wait for the task to exit. Idempotent.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(job_id = self.job_id, error = %e, "Stream session task failed");
            }
            tracing::debug!(job_id = self.job_id, "Stream session disconnected");
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SessionContext {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn set_attempts(&self, attempts: u32) {
        self.attempts.store(attempts, Ordering::Release);
    }
}

/// Connect -> read -> reconnect loop. Runs until cancelled or until the
/// reconnect budget is spent.
async fn run_session(ctx: SessionContext, mut outgoing: mpsc::UnboundedReceiver<String>) {
    let job_id = ctx.job_id;
    let mut attempts: u32 = 0;

    loop {
        ctx.set_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            result = ctx.transport.open(&ctx.url) => result,
        };

        match opened {
            Ok(conn) => {
                attempts = 0;
                ctx.set_attempts(0);
                ctx.set_state(ConnectionState::Open);
                tracing::info!(job_id, url = %ctx.url, "Stream connected");

                let outcome = read_connection(&ctx, conn, &mut outgoing).await;
                discard_unsent(job_id, &mut outgoing);
                if let ReadOutcome::Cancelled = outcome {
                    break;
                }
                tracing::info!(job_id, "Stream connection closed");
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Stream connection attempt failed");
            }
        }

        ctx.set_state(ConnectionState::Closed);
        if ctx.cancel.is_cancelled() {
            break;
        }

        let Some(delay) = ctx.policy.next_delay(attempts) else {
            tracing::error!(
                job_id,
                attempts,
                "Max reconnection attempts reached, giving up",
            );
            ctx.callbacks.on_error(job_id, RECONNECT_EXHAUSTED_MESSAGE);
            break;
        };

        attempts += 1;
        ctx.set_attempts(attempts);
        tracing::info!(
            job_id,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to stream",
        );

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.set_state(ConnectionState::Closed);
}

/// Pump one open connection until it closes or the session is cancelled.
async fn read_connection(
    ctx: &SessionContext,
    conn: Connection,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
) -> ReadOutcome {
    let job_id = ctx.job_id;
    let Connection {
        mut incoming,
        outgoing: mut sink,
    } = conn;

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                if let Err(e) = sink.close().await {
                    tracing::debug!(job_id, error = %e, "Error closing stream connection");
                }
                return ReadOutcome::Cancelled;
            }
            frame = incoming.next() => match frame {
                Some(Ok(text)) => dispatch(job_id, &text, ctx.callbacks.as_ref()),
                Some(Err(e)) => {
                    tracing::warn!(job_id, error = %e, "Stream receive error");
                    return ReadOutcome::Closed;
                }
                None => return ReadOutcome::Closed,
            },
            Some(text) = outgoing.recv() => {
                if let Err(e) = sink.send(text).await {
                    tracing::warn!(job_id, error = %e, "Failed to send stream frame");
                }
            }
        }
    }
}

/// Drop frames queued for a connection that is no longer open.
fn discard_unsent(job_id: JobId, outgoing: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while outgoing.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(job_id, dropped, "Discarded frames queued for a closed connection");
    }
}

/// Route one text frame to the callbacks.
fn dispatch(job_id: JobId, text: &str, callbacks: &dyn SessionCallbacks) {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(
                job_id,
                error = %e,
                raw_message = %text,
                "Failed to parse stream message",
            );
            return;
        }
    };
    tracing::trace!(job_id, kind = msg.kind(), "Stream message");

    match msg {
        StreamMessage::Progress {
            generation_id,
            progress: Some(progress),
            message: Some(message),
        } => callbacks.on_progress(generation_id, progress, &message),
        StreamMessage::Progress { .. } => {
            tracing::debug!(job_id, "Dropping progress message without progress or message");
        }
        StreamMessage::Complete {
            generation_id,
            data: Some(data),
        } => callbacks.on_complete(generation_id, data),
        StreamMessage::Complete { .. } => {
            tracing::debug!(job_id, "Dropping complete message without data");
        }
        StreamMessage::Error {
            generation_id,
            message: Some(message),
        } => callbacks.on_error(generation_id, &message),
        StreamMessage::Error { .. } => {
            tracing::debug!(job_id, "Dropping error message without message");
        }
        StreamMessage::Heartbeat => {
            tracing::trace!(job_id, "Heartbeat");
        }
        StreamMessage::Unknown => {
            tracing::warn!(job_id, raw_message = %text, "Unknown stream message type");
        }
    }
}
