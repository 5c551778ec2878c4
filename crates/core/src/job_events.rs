//! Message type names carried in the `type` field of generation stream
//! frames.
//!
//! Every frame is a JSON object sent on `/ws/generation/{id}`.

/// Progress update (percentage + human-readable status line).
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Job finished; `data` carries a partial result payload.
pub const MSG_TYPE_COMPLETE: &str = "complete";

/// Job failed; `message` carries the cause.
pub const MSG_TYPE_ERROR: &str = "error";

/// Keep-alive reply from the backend. Carries no state.
pub const MSG_TYPE_HEARTBEAT: &str = "heartbeat";

/// Path segment under which per-job streams are served.
pub const STREAM_PATH_PREFIX: &str = "/ws/generation";
