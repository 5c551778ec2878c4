//! In-memory [`Transport`] for embedding and deterministic tests.
//!
//! Each call to [`Transport::open`] consumes the next scripted outcome:
//! [`MemoryTransport::accept_next`] queues a connection whose server side
//! is returned as a [`MemoryPeer`], [`MemoryTransport::refuse_next`] queues
//! a connection error. With nothing queued, opens are refused.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::transport::{Connection, StreamClientError, Transport};

/// Record of one `open` call.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub url: String,
    /// Tokio clock time of the call (follows paused test time).
    pub at: Instant,
    pub accepted: bool,
}

enum Scripted {
    Accept {
        incoming: mpsc::UnboundedReceiver<Result<String, StreamClientError>>,
        outgoing: mpsc::UnboundedSender<String>,
    },
    Refuse(String),
}

#[derive(Default)]
struct MemoryState {
    script: VecDeque<Scripted>,
    opens: Vec<OpenRecord>,
}

/// Scriptable transport backed by channels.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    opened: Arc<Notify>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `open` succeed and return its server side.
    pub fn accept_next(&self) -> MemoryPeer {
        let (to_client, incoming) = mpsc::unbounded();
        let (outgoing, from_client) = mpsc::unbounded();
        self.lock().script.push_back(Scripted::Accept { incoming, outgoing });
        MemoryPeer {
            to_client,
            from_client,
        }
    }

    /// Make the next `open` fail with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.lock().script.push_back(Scripted::Refuse(reason.into()));
    }

    /// Every `open` call so far, oldest first.
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.lock().opens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens.len()
    }

    /// Wait until at least `count` opens have been attempted.
    pub async fn wait_for_opens(&self, count: usize) {
        loop {
            let notified = self.opened.notified();
            if self.open_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<Connection, StreamClientError> {
        let result = {
            let mut state = self.lock();
            let next = state.script.pop_front();
            let accepted = matches!(next, Some(Scripted::Accept { .. }));
            state.opens.push(OpenRecord {
                url: url.to_string(),
                at: Instant::now(),
                accepted,
            });

            match next {
                Some(Scripted::Accept { incoming, outgoing }) => Ok(Connection {
                    incoming: incoming.boxed(),
                    outgoing: Box::pin(outgoing.sink_map_err(|_| StreamClientError::Closed)),
                }),
                Some(Scripted::Refuse(reason)) => Err(StreamClientError::Connection(reason)),
                None => Err(StreamClientError::Connection(format!(
                    "No connection scripted for {url}"
                ))),
            }
        };

        self.opened.notify_waiters();
        result
    }
}

/// Server side of an accepted in-memory connection.
///
/// Dropping the peer closes the connection from the server side.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Result<String, StreamClientError>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Deliver a text frame to the client. Returns `false` once the client
    /// side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client.unbounded_send(Ok(text.into())).is_ok()
    }

    /// Deliver a JSON value as a text frame.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Fail the connection with a protocol error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self
            .to_client
            .unbounded_send(Err(StreamClientError::Protocol(reason.into())));
    }

    /// Close the connection. Frames already sent are still delivered.
    pub fn close(&self) {
        self.to_client.close_channel();
    }

    /// Next frame the client sent, waiting if necessary. `None` once the
    /// client dropped its side.
    pub async fn next_received(&mut self) -> Option<String> {
        self.from_client.next().await
    }

    /// Whether the client still holds its side of the connection.
    pub fn is_client_connected(&self) -> bool {
        !self.to_client.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_open_is_refused() {
        let transport = MemoryTransport::new();
        let result = transport.open("mem://a").await;
        assert!(matches!(result, Err(StreamClientError::Connection(_))));
        assert_eq!(transport.open_count(), 1);
        assert!(!transport.opens()[0].accepted);
    }

    #[tokio::test]
    async fn accepted_connection_carries_frames_both_ways() {
        let transport = MemoryTransport::new();
        let mut peer = transport.accept_next();

        let mut conn = transport.open("mem://b").await.unwrap();
        assert!(transport.opens()[0].accepted);

        assert!(peer.send_text("hello"));
        assert_eq!(conn.incoming.next().await.unwrap().unwrap(), "hello");

        conn.outgoing.send("ping".to_string()).await.unwrap();
        assert_eq!(peer.next_received().await.as_deref(), Some("ping"));

        peer.close();
        assert!(conn.incoming.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_peer_ends_incoming_stream() {
        let transport = MemoryTransport::new();
        drop(transport.accept_next());

        let mut conn = transport.open("mem://c").await.unwrap();
        assert!(conn.incoming.next().await.is_none());
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let transport = MemoryTransport::new();
        transport.refuse_next("down");
        let _peer = transport.accept_next();

        assert!(transport.open("mem://d").await.is_err());
        assert!(transport.open("mem://d").await.is_ok());
        assert!(transport.open("mem://d").await.is_err());
        assert_eq!(transport.open_count(), 3);
    }
}
