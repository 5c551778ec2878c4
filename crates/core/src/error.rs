use crate::progress::ProgressStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    /// The event is not accepted in the current status.
    #[error("Invalid progress transition: {event} while {from}")]
    Invalid {
        from: ProgressStatus,
        event: &'static str,
    },
}
