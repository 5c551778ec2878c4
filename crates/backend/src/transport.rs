//! Transport seam for job event streams.
//!
//! A [`Transport`] opens one duplex text connection per URL. The session
//! layer only ever sees the split halves of a [`Connection`], so the same
//! reconnect and dispatch logic runs over a real WebSocket
//! ([`crate::client::WebSocketTransport`]) or an in-memory pair
//! ([`crate::memory::MemoryTransport`]).

use std::pin::Pin;

use futures::stream::BoxStream;
use futures::Sink;

/// Outgoing half of a connection: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = StreamClientError> + Send>>;

/// Incoming half of a connection: yields text frames until the peer
/// closes (stream end) or the transport fails (`Err`).
pub type FrameStream = BoxStream<'static, Result<String, StreamClientError>>;

/// A live, already-open connection.
pub struct Connection {
    pub incoming: FrameStream,
    pub outgoing: FrameSink,
}

/// Opens stream connections.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Connection, StreamClientError>;
}

/// Errors raised by a stream transport.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection is already closed.
    #[error("Connection closed")]
    Closed,
}
