//! Wire types for the backend's generation REST interface.
//!
//! Request bodies omit unset optional fields so the backend applies its own
//! defaults and validation; nothing is validated client-side.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Backend-owned job status, mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// `true` when the backend will report no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextToImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageToImageRequest {
    pub prompt: String,
    /// URL or local path of the source image.
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Transformation strength in `0.0..=1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextToVideoRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Clip length in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpscaleRequest {
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A job-creation request for any of the backend's generation endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    TextToImage(TextToImageRequest),
    ImageToImage(ImageToImageRequest),
    TextToVideo(TextToVideoRequest),
    Upscale(UpscaleRequest),
}

impl GenerationRequest {
    /// Path of the job-creation endpoint, relative to the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::TextToImage(_) => "/api/generate/text-to-image",
            Self::ImageToImage(_) => "/api/generate/image-to-image",
            Self::TextToVideo(_) => "/api/generate/text-to-video",
            Self::Upscale(_) => "/api/upscale",
        }
    }

    /// Kebab-case kind, matching the backend's `generation_type` values.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextToImage(_) => "text-to-image",
            Self::ImageToImage(_) => "image-to-image",
            Self::TextToVideo(_) => "text-to-video",
            Self::Upscale(_) => "upscale",
        }
    }

    /// Serialize the request body sent to [`endpoint`](Self::endpoint).
    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::TextToImage(r) => serde_json::to_value(r),
            Self::ImageToImage(r) => serde_json::to_value(r),
            Self::TextToVideo(r) => serde_json::to_value(r),
            Self::Upscale(r) => serde_json::to_value(r),
        }
    }
}

impl From<TextToImageRequest> for GenerationRequest {
    fn from(r: TextToImageRequest) -> Self {
        Self::TextToImage(r)
    }
}

impl From<ImageToImageRequest> for GenerationRequest {
    fn from(r: ImageToImageRequest) -> Self {
        Self::ImageToImage(r)
    }
}

impl From<TextToVideoRequest> for GenerationRequest {
    fn from(r: TextToVideoRequest) -> Self {
        Self::TextToVideo(r)
    }
}

impl From<UpscaleRequest> for GenerationRequest {
    fn from(r: UpscaleRequest) -> Self {
        Self::Upscale(r)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Job record returned by job creation and by the history endpoints.
///
/// Timestamps are kept as the backend formats them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub id: JobId,
    pub generation_type: String,
    pub status: JobStatus,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Final output location; authoritative once `status` is completed.
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Seconds spent generating.
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One page of history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationListResponse {
    pub total: u64,
    pub items: Vec<GenerationResponse>,
}

/// Query filters for the history endpoint. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// Backend `/health` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the backend holds a working key for the generation API.
    #[serde(default)]
    pub runware_connected: bool,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_completed_response() {
        let json = r#"{
            "id": 7,
            "generation_type": "text-to-image",
            "status": "completed",
            "output_path": "/tmp/out.png",
            "output_url": "https://cdn.example/out.png",
            "prompt": "a lighthouse",
            "parameters": {"width": 512},
            "created_at": "2025-03-01T10:00:00",
            "completed_at": "2025-03-01T10:00:04",
            "processing_time": 4.2,
            "error_message": null
        }"#;
        let resp: GenerationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, 7);
        assert_eq!(resp.status, JobStatus::Completed);
        assert_eq!(
            resp.output_url.as_deref(),
            Some("https://cdn.example/out.png")
        );
        assert_eq!(resp.parameters["width"], 512);
        assert_eq!(resp.processing_time, Some(4.2));
    }

    #[test]
    fn parse_minimal_pending_response() {
        let json = r#"{"id": 42, "generation_type": "text-to-video", "status": "pending", "output_url": null}"#;
        let resp: GenerationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, 42);
        assert_eq!(resp.status, JobStatus::Pending);
        assert!(resp.output_url.is_none());
        assert!(resp.prompt.is_empty());
    }

    #[test]
    fn unknown_status_maps_to_unknown() {
        let json = r#"{"id": 1, "generation_type": "upscale", "status": "queued"}"#;
        let resp: GenerationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, JobStatus::Unknown);
        assert!(!resp.status.is_terminal());
    }

    #[test]
    fn request_body_omits_unset_fields() {
        let req = GenerationRequest::from(TextToImageRequest {
            prompt: "a red fox".into(),
            width: Some(768),
            ..Default::default()
        });
        let body = req.body().unwrap();
        assert_eq!(body["prompt"], "a red fox");
        assert_eq!(body["width"], 768);
        assert!(body.get("height").is_none());
        assert!(body.get("negative_prompt").is_none());
    }

    #[test]
    fn endpoints_per_kind() {
        let upscale = GenerationRequest::from(UpscaleRequest {
            image_url: "file:///a.png".into(),
            ..Default::default()
        });
        assert_eq!(upscale.endpoint(), "/api/upscale");
        assert_eq!(upscale.kind(), "upscale");

        let video = GenerationRequest::from(TextToVideoRequest::default());
        assert_eq!(video.endpoint(), "/api/generate/text-to-video");

        let img2img = GenerationRequest::from(ImageToImageRequest::default());
        assert_eq!(img2img.endpoint(), "/api/generate/image-to-image");
    }

    #[test]
    fn history_filters_serialize_only_set_fields() {
        let filters = HistoryFilters {
            status: Some("completed".into()),
            limit: Some(20),
            ..Default::default()
        };
        let value = serde_json::to_value(&filters).unwrap();
        assert_eq!(value, serde_json::json!({"status": "completed", "limit": 20}));
    }

    #[test]
    fn health_status() {
        let health: HealthResponse =
            serde_json::from_str(r#"{"status":"healthy","runware_connected":true}"#).unwrap();
        assert!(health.is_healthy());
        assert!(health.runware_connected);
    }
}
