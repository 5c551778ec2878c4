//! Callbacks fired by a [`StreamSession`](crate::session::StreamSession).
//!
//! Implement [`SessionCallbacks`] directly, or hand the session an
//! `mpsc::UnboundedSender<SessionEvent>` and consume [`SessionEvent`]s on
//! your own task.

use serde::Serialize;
use studio_core::types::JobId;
use tokio::sync::mpsc;

/// Message passed to `on_error` once the reconnect budget is spent.
pub const RECONNECT_EXHAUSTED_MESSAGE: &str = "Connection failed after multiple attempts";

/// Receiver of recognised stream messages.
///
/// Called from the session's task, in delivery order. Implementations must
/// not block.
pub trait SessionCallbacks: Send + Sync {
    fn on_progress(&self, job_id: JobId, progress: f64, message: &str);

    fn on_complete(&self, job_id: JobId, data: serde_json::Value);

    fn on_error(&self, job_id: JobId, message: &str);
}

/// A session callback captured as a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    /// The job made progress.
    Progress {
        job_id: JobId,
        /// Percentage as sent by the backend (not clamped).
        progress: f64,
        message: String,
    },

    /// The backend reported the job complete.
    Completed {
        job_id: JobId,
        /// Partial result payload; not the full job record.
        data: serde_json::Value,
    },

    /// The job failed, or the stream could not be kept alive.
    Failed { job_id: JobId, message: String },
}

impl SessionEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => *job_id,
        }
    }
}

impl SessionCallbacks for mpsc::UnboundedSender<SessionEvent> {
    fn on_progress(&self, job_id: JobId, progress: f64, message: &str) {
        // A closed receiver means nobody is tracking the job any more.
        let _ = self.send(SessionEvent::Progress {
            job_id,
            progress,
            message: message.to_string(),
        });
    }

    fn on_complete(&self, job_id: JobId, data: serde_json::Value) {
        let _ = self.send(SessionEvent::Completed { job_id, data });
    }

    fn on_error(&self, job_id: JobId, message: &str) {
        let _ = self.send(SessionEvent::Failed {
            job_id,
            message: message.to_string(),
        });
    }
}
