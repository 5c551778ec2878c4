//! Stream client for the backend's per-job event endpoint.
//!
//! [`StreamClient`] holds the WebSocket base URL, the transport, and the
//! reconnection policy. Call [`StreamClient::connect`] to start a
//! [`StreamSession`] bound to one job.

use std::sync::Arc;

use futures::{future, SinkExt, StreamExt};
use studio_core::job_events::STREAM_PATH_PREFIX;
use studio_core::types::JobId;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::events::SessionCallbacks;
use crate::reconnect::ReconnectPolicy;
use crate::session::StreamSession;
use crate::transport::{Connection, StreamClientError, Transport};

/// Factory for job stream sessions.
pub struct StreamClient {
    ws_url: String,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
}

impl StreamClient {
    /// Create a client for a backend.
    ///
    /// * `ws_url`    - WebSocket base URL, e.g. `ws://127.0.0.1:8000`.
    /// * `transport` - how connections are opened.
    pub fn new(ws_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            ws_url: ws_url.into(),
            transport,
            policy: ReconnectPolicy::default(),
        }
    }

    /// Replace the default reconnection policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Reconnection policy handed to every new session.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Address of the event stream for `job_id`.
    pub fn session_url(&self, job_id: JobId) -> String {
        format!(
            "{}{}/{}",
            self.ws_url.trim_end_matches('/'),
            STREAM_PATH_PREFIX,
            job_id
        )
    }

    /// Start a session for `job_id`.
    ///
    /// The session connects in the background; `callbacks` receive every
    /// recognised message until [`StreamSession::disconnect`] is called or
    /// the reconnect budget runs out. Must be called within a Tokio runtime.
    pub fn connect(&self, job_id: JobId, callbacks: Arc<dyn SessionCallbacks>) -> StreamSession {
        StreamSession::spawn(
            job_id,
            self.session_url(job_id),
            Arc::clone(&self.transport),
            self.policy.clone(),
            callbacks,
        )
    }
}

/// [`Transport`] over `tokio-tungstenite`.
///
/// Only text frames are surfaced. A close frame ends the incoming stream;
/// ping/pong is answered by tungstenite itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Connection, StreamClientError> {
        let (ws_stream, _response) = connect_async(url).await.map_err(|e| {
            StreamClientError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        tracing::debug!(url, "WebSocket handshake complete");

        let (sink, stream) = ws_stream.split();

        let outgoing = sink
            .sink_map_err(|e| StreamClientError::Protocol(e.to_string()))
            .with(|text: String| future::ok::<_, StreamClientError>(Message::Text(text)));

        let incoming = stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    // Binary frames carry nothing for this protocol.
                    Ok(_) => None,
                    Err(e) => Some(Err(StreamClientError::Protocol(e.to_string()))),
                })
            });

        Ok(Connection {
            incoming: incoming.boxed(),
            outgoing: Box::pin(outgoing),
        })
    }
}
