//! Backend client library for the generation service.
//!
//! Provides the REST wrapper for job submission and history, typed
//! stream message parsing, a pluggable stream transport (WebSocket or
//! in-memory), the reconnection policy, and [`session::StreamSession`],
//! which keeps one job's event stream alive and dispatches its messages.

pub mod api;
pub mod client;
pub mod events;
pub mod memory;
pub mod messages;
pub mod reconnect;
pub mod session;
pub mod transport;
