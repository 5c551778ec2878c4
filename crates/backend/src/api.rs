//! REST API client for the backend's generation endpoints.
//!
//! Wraps job creation, job record retrieval, history management and the
//! health probe using [`reqwest`].

use std::time::Duration;

use studio_core::generation::{
    GenerationListResponse, GenerationRequest, GenerationResponse, HealthResponse, HistoryFilters,
};
use studio_core::types::JobId;

/// Job submission and lookup, as needed by the submission client.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// Create a job. The backend may finish it before responding.
    async fn create_job(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, ApiError>;

    /// Fetch the full record of a job.
    async fn fetch_job(&self, job_id: JobId) -> Result<GenerationResponse, ApiError>;
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The request body could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// HTTP client for one backend instance.
#[derive(Clone)]
pub struct BackendApi {
    client: reqwest::Client,
    api_url: String,
}

impl BackendApi {
    /// Create a client for a backend.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client whose requests time out after `timeout`.
    pub fn with_timeout(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Base HTTP URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Retrieve one page of generation history.
    ///
    /// Sends `GET /api/history` with the set filters as query parameters.
    pub async fn list_history(
        &self,
        filters: &HistoryFilters,
    ) -> Result<GenerationListResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/history", self.api_url))
            .query(filters)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a generation and its stored output.
    ///
    /// Sends `DELETE /api/history/{id}`.
    pub async fn delete_generation(&self, job_id: JobId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/api/history/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Query backend health (`GET /health`).
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/health", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`] carrying
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobApi for BackendApi {
    /// Sends `POST {endpoint}` with the request body.
    async fn create_job(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ApiError> {
        let body = request.body()?;

        tracing::debug!(kind = request.kind(), "Submitting generation request");

        let response = self
            .client
            .post(format!("{}{}", self.api_url, request.endpoint()))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Sends `GET /api/history/{id}`.
    async fn fetch_job(&self, job_id: JobId) -> Result<GenerationResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/history/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = BackendApi::new("http://127.0.0.1:8000/");
        assert_eq!(api.api_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn status_error_message_includes_body() {
        let err = ApiError::Status {
            status: 422,
            body: "prompt too long".into(),
        };
        assert_eq!(err.to_string(), "Backend API error (422): prompt too long");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let api = BackendApi::with_timeout("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = api.fetch_job(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
    }
}
