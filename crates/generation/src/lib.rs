//! UI-facing generation layer.
//!
//! [`client::GenerationClient`] submits jobs and tracks them over the
//! backend's event stream; [`store::GenerationStore`] holds the observable
//! progress state; [`notifications::NotificationCenter`] keeps short-lived
//! user notifications.

pub mod client;
pub mod config;
pub mod error;
pub mod notifications;
pub mod store;
