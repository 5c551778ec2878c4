//! Client-side progress state machine for a single generation job.
//!
//! ```text
//! idle ──Accepted──────────────▶ generating ──Completed──▶ completed
//!   │                              │    ▲
//!   ├──CompletedImmediately──▶ completed │ Progress
//!   │                              │    │
//!   └──Failed──▶ error ◀──Failed───┘────┘
//! ```
//!
//! `completed` and `error` are terminal: only `Reset` leaves them. A new
//! submission always starts from `Reset`.

use std::fmt;

use serde::Serialize;

use crate::error::TransitionError;

/// Progress value reported for any completed job.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Lifecycle status as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Generating,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` end a job's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive [`ProgressState`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Clear everything before a new submission.
    Reset,
    /// The backend accepted the job and will report progress asynchronously.
    Accepted,
    /// The backend finished the job inside the submission call.
    CompletedImmediately,
    /// A stream progress update. Values are passed through unclamped.
    Progress { progress: f64, message: String },
    /// The job finished and its full record was fetched.
    Completed,
    /// The job, its stream, or the submission failed.
    Failed { error: String },
}

impl ProgressEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Accepted => "accepted",
            Self::CompletedImmediately => "completed_immediately",
            Self::Progress { .. } => "progress",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Snapshot of a job's progress for UI consumption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub status: ProgressStatus,
    /// Percentage in `0..=100` as reported by the backend.
    pub progress: f64,
    /// Latest status line, last write wins.
    pub message: Option<String>,
    /// Only set while `status` is `error`.
    pub error: Option<String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            status: ProgressStatus::Idle,
            progress: 0.0,
            message: None,
            error: None,
        }
    }
}

impl ProgressState {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Compute the state that follows `event`.
    ///
    /// Returns [`TransitionError::Invalid`] when the event is not accepted
    /// in the current status; the caller keeps the old state in that case.
    pub fn apply(&self, event: ProgressEvent) -> Result<ProgressState, TransitionError> {
        use ProgressStatus::*;

        let next = match (self.status, event) {
            (_, ProgressEvent::Reset) => ProgressState::default(),
            (Idle, ProgressEvent::Accepted) => ProgressState {
                status: Generating,
                ..ProgressState::default()
            },
            (Idle, ProgressEvent::CompletedImmediately) | (Generating, ProgressEvent::Completed) => {
                ProgressState {
                    status: Completed,
                    progress: PROGRESS_COMPLETE,
                    message: self.message.clone(),
                    error: None,
                }
            }
            (Generating, ProgressEvent::Progress { progress, message }) => ProgressState {
                status: Generating,
                progress,
                message: Some(message),
                error: None,
            },
            (Idle | Generating, ProgressEvent::Failed { error }) => ProgressState {
                status: Error,
                progress: 0.0,
                message: self.message.clone(),
                error: Some(error),
            },
            (from, event) => {
                return Err(TransitionError::Invalid {
                    from,
                    event: event.name(),
                })
            }
        };

        Ok(next)
    }
}
