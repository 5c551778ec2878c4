//! Domain types shared by the generation client crates.
//!
//! This crate has zero internal deps: wire DTOs for the backend's REST
//! interface, stream message-type names, and the client-side
//! [`progress::ProgressState`] state machine.

pub mod error;
pub mod generation;
pub mod job_events;
pub mod progress;
pub mod types;
