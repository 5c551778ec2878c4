//! Job submission and tracking.
//!
//! [`GenerationClient::submit`] creates a job and picks one of three paths
//! from the response status:
//!
//! - `completed`: the store goes straight to completed, no stream is opened.
//! - `failed`: the store goes straight to error, no stream is opened.
//! - anything else: the store goes to generating and a background tracker
//!   follows the job's event stream until a terminal event.
//!
//! After a `complete` event the tracker fetches the full job record before
//! marking the job completed; the stream payload is only partial.

use std::sync::Arc;

use studio_backend::api::{ApiError, BackendApi, JobApi};
use studio_backend::client::{StreamClient, WebSocketTransport};
use studio_backend::events::SessionEvent;
use studio_backend::session::StreamSession;
use studio_core::generation::{GenerationRequest, GenerationResponse, JobStatus};
use studio_core::types::JobId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::SubmitError;
use crate::notifications::NotificationCenter;
use crate::store::GenerationStore;

/// Error text used when a failed job carries no message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

/// Submits generation jobs and keeps [`GenerationStore`] in sync with them.
///
/// At most one job is tracked at a time; a new submission stops tracking
/// the previous one first.
pub struct GenerationClient {
    api: Arc<dyn JobApi>,
    streams: StreamClient,
    store: Arc<GenerationStore>,
    notifications: Arc<NotificationCenter>,
    tracking: Mutex<Tracking>,
}

/// What the client is doing right now. The lock is never held across a
/// backend request.
#[derive(Default)]
struct Tracking {
    /// Token of the submission whose create request is in flight.
    submission: Option<CancellationToken>,
    job: Option<ActiveJob>,
}

/// The job currently followed by a tracker task.
struct ActiveJob {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveJob {
    /// Stop the tracker and wait for it to disconnect its session.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(job_id = self.job_id, error = %e, "Job tracker task failed");
        }
    }
}

/// Shared handles the tracker task works with.
struct JobTracker {
    job_id: JobId,
    kind: &'static str,
    api: Arc<dyn JobApi>,
    store: Arc<GenerationStore>,
    notifications: Arc<NotificationCenter>,
    cancel: CancellationToken,
}

impl GenerationClient {
    pub fn new(
        api: Arc<dyn JobApi>,
        streams: StreamClient,
        store: Arc<GenerationStore>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            api,
            streams,
            store,
            notifications,
            tracking: Mutex::new(Tracking::default()),
        }
    }

    /// Wire a client to a real backend: REST over `reqwest`, events over
    /// WebSocket.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let api = BackendApi::with_timeout(&config.api_url, config.request_timeout)?;
        let streams = StreamClient::new(&config.ws_url, Arc::new(WebSocketTransport))
            .with_policy(config.reconnect_policy());

        Ok(Self::new(
            Arc::new(api),
            streams,
            Arc::new(GenerationStore::new(config.recent_limit)),
            Arc::new(NotificationCenter::new(config.notification_ttl)),
        ))
    }

    pub fn store(&self) -> &Arc<GenerationStore> {
        &self.store
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Job currently followed over its event stream, if any.
    pub async fn active_job(&self) -> Option<JobId> {
        self.tracking
            .lock()
            .await
            .job
            .as_ref()
            .filter(|job| !job.task.is_finished())
            .map(|job| job.job_id)
    }

    /// Submit a generation request.
    ///
    /// Returns the backend's job record as created. Progress after that is
    /// reported through the store. A request failure moves the store to
    /// `error` and is also returned. A submission interrupted by
    /// [`cancel`](Self::cancel) or by a newer submission returns
    /// [`SubmitError::Cancelled`] and leaves the store alone.
    pub async fn submit(
        &self,
        request: impl Into<GenerationRequest>,
    ) -> Result<GenerationResponse, SubmitError> {
        let request = request.into();
        let kind = request.kind();
        let submission = CancellationToken::new();

        {
            let mut tracking = self.tracking.lock().await;
            if let Some(previous) = tracking.submission.replace(submission.clone()) {
                tracing::info!(kind, "Superseding in-flight submission");
                previous.cancel();
            }
            if let Some(previous) = tracking.job.take() {
                tracing::info!(job_id = previous.job_id, "Stopping previous job tracker");
                previous.stop().await;
            }
            self.store.begin();
        }

        let created = tokio::select! {
            biased;
            _ = submission.cancelled() => None,
            created = self.api.create_job(&request) => Some(created),
        };

        let mut tracking = self.tracking.lock().await;
        let created = match created {
            Some(created) if !submission.is_cancelled() => created,
            _ => {
                tracing::info!(kind, "Submission cancelled before the backend answered");
                return Err(SubmitError::Cancelled);
            }
        };
        // Not cancelled, so no newer submission has replaced this one.
        tracking.submission = None;

        let job = match created {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(kind, error = %e, "Generation request failed");
                self.store.fail_submission(e.to_string());
                self.notifications.error(failure_notice(kind));
                return Err(e.into());
            }
        };

        match job.status {
            JobStatus::Completed => {
                tracing::info!(job_id = job.id, kind, "Generation completed immediately");
                self.store.complete_immediately(job.clone());
                self.notifications.success(success_notice(kind));
            }
            JobStatus::Failed => {
                let error = job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                tracing::warn!(job_id = job.id, kind, error = %error, "Generation failed on submission");
                self.store.fail_immediately(job.id, error);
                self.notifications.error(failure_notice(kind));
            }
            status => {
                tracing::info!(job_id = job.id, kind, ?status, "Generation accepted, tracking progress");
                self.store.accept(job.id);
                tracking.job = Some(self.track(job.id, kind));
            }
        }

        Ok(job)
    }

    /// Abandon an in-flight submission and stop following the active job.
    /// The job keeps running on the backend and the store keeps its last
    /// state.
    pub async fn cancel(&self) {
        let mut tracking = self.tracking.lock().await;
        if let Some(submission) = tracking.submission.take() {
            tracing::info!("Cancelling in-flight submission");
            submission.cancel();
        }
        if let Some(job) = tracking.job.take() {
            tracing::info!(job_id = job.job_id, "Cancelling job tracking");
            job.stop().await;
        }
    }

    /// Stop tracking and drop every pending notification timer.
    pub async fn shutdown(&self) {
        self.cancel().await;
        self.notifications.clear();
        tracing::info!("Generation client shut down");
    }

    fn track(&self, job_id: JobId, kind: &'static str) -> ActiveJob {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.streams.connect(job_id, Arc::new(tx));
        let cancel = CancellationToken::new();

        let tracker = JobTracker {
            job_id,
            kind,
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            notifications: Arc::clone(&self.notifications),
            cancel: cancel.clone(),
        };

        ActiveJob {
            job_id,
            cancel,
            task: tokio::spawn(tracker.run(session, rx)),
        }
    }
}

impl JobTracker {
    /// Consume session events until the job reaches a terminal state or
    /// tracking is cancelled. The session is always disconnected on exit.
    async fn run(
        self,
        mut session: StreamSession,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let job_id = self.job_id;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = events.recv() => event,
            };

            let Some(event) = event else {
                tracing::debug!(job_id, "Stream session ended");
                break;
            };

            if event.job_id() != job_id {
                tracing::debug!(job_id, event_job_id = event.job_id(), "Ignoring event for another job");
                continue;
            }

            match event {
                SessionEvent::Progress {
                    progress, message, ..
                } => {
                    self.store.progress_for(job_id, progress, &message);
                }
                SessionEvent::Completed { .. } => {
                    session.disconnect().await;
                    self.finish().await;
                    break;
                }
                SessionEvent::Failed { message, .. } => {
                    tracing::warn!(job_id, error = %message, "Generation failed");
                    session.disconnect().await;
                    self.store.fail_job(job_id, message);
                    self.notifications.error(failure_notice(self.kind));
                    break;
                }
            }
        }

        session.disconnect().await;
        tracing::debug!(job_id, "Job tracker exited");
    }

    /// Fetch the full record of a completed job and publish it.
    async fn finish(&self) {
        let job_id = self.job_id;

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            fetched = self.api.fetch_job(job_id) => fetched,
        };

        match fetched {
            Ok(record) => {
                tracing::info!(job_id, output_url = ?record.output_url, "Generation completed");
                self.store.complete(record);
                self.notifications.success(success_notice(self.kind));
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to fetch completed generation");
                self.store
                    .fail_job(job_id, format!("Failed to fetch result: {e}"));
                self.notifications.error(failure_notice(self.kind));
            }
        }
    }
}

/// User-facing text for a successful job of `kind`.
fn success_notice(kind: &str) -> &'static str {
    match kind {
        "image-to-image" => "Image transformation completed!",
        "text-to-video" => "Video generated successfully!",
        "upscale" => "Image upscaled successfully!",
        _ => "Image generated successfully!",
    }
}

/// User-facing text for a failed job of `kind`.
fn failure_notice(kind: &str) -> &'static str {
    match kind {
        "image-to-image" => "Failed to transform image",
        "text-to-video" => "Failed to generate video",
        "upscale" => "Failed to upscale image",
        _ => "Failed to generate image",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_per_kind() {
        assert_eq!(success_notice("text-to-video"), "Video generated successfully!");
        assert_eq!(failure_notice("image-to-image"), "Failed to transform image");
        assert_eq!(success_notice("text-to-image"), "Image generated successfully!");
        assert_eq!(failure_notice("upscale"), "Failed to upscale image");
    }
}
