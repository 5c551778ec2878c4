use studio_backend::api::ApiError;

/// Errors returned by [`crate::client::GenerationClient::submit`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The job-creation request failed. The store is already in `error`.
    #[error("Failed to submit generation: {0}")]
    Api(#[from] ApiError),

    /// The submission was cancelled, or replaced by a newer one, before
    /// the backend answered.
    #[error("Submission cancelled")]
    Cancelled,
}

/// Errors from loading [`crate::config::ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}
