//! Generation stream message types and parser.
//!
//! The backend sends flat JSON objects discriminated by a `"type"` field,
//! e.g. `{"type": "progress", "generation_id": 4, "progress": 40.0,
//! "message": "Sampling"}`. Payload fields may be absent or `null`; both
//! deserialize to `None`.

use serde::Deserialize;
use studio_core::job_events::{
    MSG_TYPE_COMPLETE, MSG_TYPE_ERROR, MSG_TYPE_HEARTBEAT, MSG_TYPE_PROGRESS,
};
use studio_core::types::JobId;

/// All generation stream message types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// Step-level progress for a job.
    Progress {
        generation_id: JobId,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },

    /// The job finished. `data` is a partial payload, not the job record.
    Complete {
        generation_id: JobId,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },

    /// The job failed.
    Error {
        generation_id: JobId,
        #[serde(default)]
        message: Option<String>,
    },

    /// Keep-alive reply.
    Heartbeat,

    /// Any `type` this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl StreamMessage {
    /// Wire name of the message type, or `"unknown"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => MSG_TYPE_PROGRESS,
            Self::Complete { .. } => MSG_TYPE_COMPLETE,
            Self::Error { .. } => MSG_TYPE_ERROR,
            Self::Heartbeat => MSG_TYPE_HEARTBEAT,
            Self::Unknown => "unknown",
        }
    }
}

/// Parse a stream text frame into a typed message.
///
/// Returns `Err` for malformed JSON, a missing `type`, or a recognised
/// type without its `generation_id`. Unknown types parse to
/// [`StreamMessage::Unknown`]; callers log and continue.
pub fn parse_message(text: &str) -> Result<StreamMessage, serde_json::Error> {
    serde_json::from_str(text)
}
