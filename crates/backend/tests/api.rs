//! `BackendApi` against a throwaway axum backend on a random port.

use std::collections::HashMap;

use assert_matches::assert_matches;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use studio_backend::api::{ApiError, BackendApi, JobApi};
use studio_core::generation::{
    GenerationRequest, HistoryFilters, JobStatus, TextToImageRequest, UpscaleRequest,
};

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn record(id: i64, status: &str) -> Value {
    let output_url = (status == "completed").then(|| format!("https://cdn.test/{id}.png"));
    json!({
        "id": id,
        "generation_type": "text-to-image",
        "status": status,
        "output_path": null,
        "output_url": output_url,
        "prompt": "a lighthouse at dusk",
        "parameters": {"width": 512},
        "created_at": "2025-03-01T10:00:00",
        "completed_at": null,
        "processing_time": null,
        "error_message": null
    })
}

async fn text_to_image(Json(body): Json<Value>) -> Result<Json<Value>, (StatusCode, String)> {
    if body.get("prompt").and_then(Value::as_str).unwrap_or("").is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "prompt is required".into()));
    }
    // Echo back which optional fields arrived so the test can check them.
    let mut rec = record(42, "pending");
    rec["parameters"] = body;
    Ok(Json(rec))
}

async fn upscale() -> Json<Value> {
    let mut rec = record(43, "completed");
    rec["generation_type"] = json!("upscale");
    Json(rec)
}

async fn get_record(Path(id): Path<i64>) -> Result<Json<Value>, (StatusCode, String)> {
    if id == 999 {
        return Err((StatusCode::NOT_FOUND, "Generation not found".into()));
    }
    Ok(Json(record(id, "completed")))
}

async fn delete_record(Path(id): Path<i64>) -> Result<StatusCode, (StatusCode, String)> {
    if id == 999 {
        return Err((StatusCode::NOT_FOUND, "Generation not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_history(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let status = params.get("status").cloned().unwrap_or_default();
    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(50);
    let items: Vec<Value> = (1..=3)
        .map(|id| record(id, if status.is_empty() { "pending" } else { status.as_str() }))
        .take(limit)
        .collect();
    Json(json!({"total": 3, "items": items}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "runware_connected": true}))
}

fn router() -> Router {
    Router::new()
        .route("/api/generate/text-to-image", post(text_to_image))
        .route("/api/upscale", post(upscale))
        .route("/api/history", get(list_history))
        .route("/api/history/{id}", get(get_record).delete(delete_record))
        .route("/health", get(health))
}

// ---------------------------------------------------------------------------
// Test: job creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_job_posts_body_to_kind_endpoint() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let request = GenerationRequest::from(TextToImageRequest {
        prompt: "a lighthouse at dusk".into(),
        steps: Some(30),
        ..Default::default()
    });
    let job = api.create_job(&request).await.unwrap();

    assert_eq!(job.id, 42);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.parameters["steps"], 30);
    assert!(job.parameters.get("width").is_none());
}

#[tokio::test]
async fn create_job_may_complete_immediately() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let request = GenerationRequest::from(UpscaleRequest {
        image_url: "https://cdn.test/src.png".into(),
        scale_factor: Some(2),
        ..Default::default()
    });
    let job = api.create_job(&request).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.output_url.as_deref(), Some("https://cdn.test/43.png"));
}

#[tokio::test]
async fn rejected_request_maps_to_status_error() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let request = GenerationRequest::from(TextToImageRequest::default());
    let err = api.create_job(&request).await.unwrap_err();

    assert_matches!(err, ApiError::Status { status: 422, body } if body == "prompt is required");
}

// ---------------------------------------------------------------------------
// Test: records and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_job_returns_full_record() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let job = api.fetch_job(42).await.unwrap();
    assert_eq!(job.id, 42);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.prompt, "a lighthouse at dusk");
}

#[tokio::test]
async fn fetch_missing_job_is_not_found() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let err = api.fetch_job(999).await.unwrap_err();
    assert_matches!(err, ApiError::Status { status: 404, .. });
}

#[tokio::test]
async fn list_history_sends_filters_as_query() {
    let api = BackendApi::new(spawn_backend(router()).await);

    let page = api
        .list_history(&HistoryFilters {
            status: Some("completed".into()),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|g| g.status == JobStatus::Completed));
}

#[tokio::test]
async fn delete_generation_checks_status() {
    let api = BackendApi::new(spawn_backend(router()).await);

    api.delete_generation(5).await.unwrap();
    let err = api.delete_generation(999).await.unwrap_err();
    assert_matches!(err, ApiError::Status { status: 404, .. });
}

#[tokio::test]
async fn health_reports_backend_status() {
    let base = spawn_backend(router()).await;
    let api = BackendApi::new(format!("{base}/"));

    let health = api.health().await.unwrap();
    assert!(health.is_healthy());
    assert!(health.runware_connected);
}
