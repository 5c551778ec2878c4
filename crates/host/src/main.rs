//! `studio-host` -- headless generation client.
//!
//! Submits one generation to the backend, logs every progress transition
//! until the job finishes, then prints the output location.
//!
//! # Environment variables
//!
//! | Variable        | Required | Default         | Description                                  |
//! |-----------------|----------|-----------------|----------------------------------------------|
//! | `STUDIO_PROMPT` | yes      | --              | Prompt for the generation                    |
//! | `STUDIO_KIND`   | no       | `text-to-image` | `text-to-image` or `text-to-video`           |
//! | `STUDIO_*`      | no       | see below       | Client settings read by `ClientConfig`       |
//!
//! Client settings (`STUDIO_API_URL`, `STUDIO_WS_URL`,
//! `STUDIO_REQUEST_TIMEOUT_SECS`, `STUDIO_MAX_RECONNECT_ATTEMPTS`,
//! `STUDIO_NOTIFICATION_TTL_SECS`, `STUDIO_RECENT_LIMIT`) are documented on
//! `ClientConfig::from_env`.

use std::time::Duration;

use anyhow::{bail, Context};
use studio_backend::api::BackendApi;
use studio_core::generation::{GenerationRequest, TextToImageRequest, TextToVideoRequest};
use studio_core::progress::ProgressStatus;
use studio_generation::client::GenerationClient;
use studio_generation::config::ClientConfig;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Timeout for the startup health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_host=info,studio_generation=info,studio_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    let prompt = std::env::var("STUDIO_PROMPT")
        .context("STUDIO_PROMPT environment variable is required")?;
    let kind = std::env::var("STUDIO_KIND").unwrap_or_else(|_| "text-to-image".into());
    let request = build_request(&kind, prompt)?;

    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        kind = request.kind(),
        "Starting studio-host",
    );

    check_health(&config).await;

    let client = GenerationClient::from_config(&config)?;

    let mut updates = client.store().subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    let state = update.state;
                    tracing::info!(
                        job_id = ?update.job_id,
                        status = %state.status,
                        progress = state.progress,
                        status_message = ?state.message,
                        error = ?state.error,
                        "Progress",
                    );
                    if state.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Progress log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let run = async {
        if let Err(e) = client.submit(request).await {
            tracing::error!(error = %e, "Submission failed");
        }
        client.store().wait_for_terminal().await
    };

    let final_state = tokio::select! {
        state = run => state,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping");
            client.shutdown().await;
            return Ok(());
        }
    };

    if let Err(e) = logger.await {
        tracing::warn!(error = %e, "Progress logger task failed");
    }
    client.shutdown().await;

    match final_state.status {
        ProgressStatus::Completed => {
            let output = client
                .store()
                .current_result()
                .and_then(|r| r.output_url.or(r.output_path));
            tracing::info!(output = ?output, "Generation finished");
            Ok(())
        }
        _ => bail!(
            "Generation failed: {}",
            final_state.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Build the request for `kind` from the prompt.
fn build_request(kind: &str, prompt: String) -> anyhow::Result<GenerationRequest> {
    let request: GenerationRequest = match kind {
        "text-to-image" => TextToImageRequest {
            prompt,
            ..Default::default()
        }
        .into(),
        // Five-second clip at 24 fps.
        "text-to-video" => TextToVideoRequest {
            prompt,
            duration: Some(5),
            fps: Some(24),
            ..Default::default()
        }
        .into(),
        other => bail!("STUDIO_KIND must be text-to-image or text-to-video, got {other:?}"),
    };
    Ok(request)
}

/// Log backend health; an unreachable backend is not fatal here, the
/// submission reports it.
async fn check_health(config: &ClientConfig) {
    let api = match BackendApi::with_timeout(&config.api_url, HEALTH_TIMEOUT) {
        Ok(api) => api,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build health client");
            return;
        }
    };

    match api.health().await {
        Ok(health) if health.is_healthy() => {
            tracing::info!(runware_connected = health.runware_connected, "Backend healthy");
        }
        Ok(health) => {
            tracing::warn!(status = %health.status, "Backend reports degraded health");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Backend health check failed");
        }
    }
}
