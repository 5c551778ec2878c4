//! Observable progress state for the active generation.
//!
//! [`GenerationStore`] is shared via `Arc` between the submission client
//! (the only writer) and any number of readers. Every accepted transition
//! is published on a `tokio::sync::broadcast` channel; rejected transitions
//! are logged and leave the state untouched.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use studio_core::generation::GenerationResponse;
use studio_core::progress::{ProgressEvent, ProgressState};
use studio_core::types::JobId;
use tokio::sync::broadcast;

/// Buffer capacity for the update channel.
const DEFAULT_CAPACITY: usize = 256;

/// Default number of results kept in [`GenerationStore::recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Job the transition belongs to; `None` for a submission that never
    /// produced a job.
    pub job_id: Option<JobId>,
    pub state: ProgressState,
}

#[derive(Default)]
struct StoreState {
    progress: ProgressState,
    current_job: Option<JobId>,
    current_result: Option<GenerationResponse>,
    recent: VecDeque<GenerationResponse>,
}

pub struct GenerationStore {
    state: Mutex<StoreState>,
    updates: broadcast::Sender<ProgressUpdate>,
    recent_limit: usize,
}

impl GenerationStore {
    /// Create a store keeping at most `recent_limit` finished results.
    pub fn new(recent_limit: usize) -> Self {
        let (updates, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            updates,
            recent_limit,
        }
    }

    /// Subscribe to every accepted transition, in order.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full;
    /// [`progress`](Self::progress) always has the latest state.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.updates.subscribe()
    }

    pub fn progress(&self) -> ProgressState {
        self.lock().progress.clone()
    }

    /// Job whose events the store currently accepts.
    pub fn current_job(&self) -> Option<JobId> {
        self.lock().current_job
    }

    /// Full record of the last completed job.
    pub fn current_result(&self) -> Option<GenerationResponse> {
        self.lock().current_result.clone()
    }

    /// Completed results, newest first.
    pub fn recent(&self) -> Vec<GenerationResponse> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn clear_recent(&self) {
        self.lock().recent.clear();
    }

    /// Wait until the progress state is terminal and return it.
    pub async fn wait_for_terminal(&self) -> ProgressState {
        let mut updates = self.subscribe();
        loop {
            let current = self.progress();
            if current.is_terminal() {
                return current;
            }
            if let Err(broadcast::error::RecvError::Closed) = updates.recv().await {
                return self.progress();
            }
        }
    }

    // ---- transitions (driven by the submission client) ----

    /// Reset to idle before a new submission.
    pub(crate) fn begin(&self) {
        let mut state = self.lock();
        state.current_job = None;
        state.current_result = None;
        self.apply(&mut state, None, ProgressEvent::Reset);
    }

    /// The backend accepted `job_id` and will report progress.
    pub(crate) fn accept(&self, job_id: JobId) {
        let mut state = self.lock();
        state.current_job = Some(job_id);
        self.apply(&mut state, Some(job_id), ProgressEvent::Accepted);
    }

    /// The backend finished the job inside the submission call.
    pub(crate) fn complete_immediately(&self, result: GenerationResponse) {
        let mut state = self.lock();
        let job_id = result.id;
        state.current_job = Some(job_id);
        if self.apply(&mut state, Some(job_id), ProgressEvent::CompletedImmediately) {
            self.record_result(&mut state, result);
        }
    }

    pub(crate) fn progress_for(&self, job_id: JobId, progress: f64, message: &str) {
        let mut state = self.lock();
        if !Self::is_current(&state, job_id) {
            return;
        }
        self.apply(
            &mut state,
            Some(job_id),
            ProgressEvent::Progress {
                progress,
                message: message.to_string(),
            },
        );
    }

    /// The tracked job finished and `result` is its full record.
    pub(crate) fn complete(&self, result: GenerationResponse) {
        let mut state = self.lock();
        let job_id = result.id;
        if !Self::is_current(&state, job_id) {
            return;
        }
        if self.apply(&mut state, Some(job_id), ProgressEvent::Completed) {
            self.record_result(&mut state, result);
        }
    }

    /// The backend reported the job failed inside the submission call.
    pub(crate) fn fail_immediately(&self, job_id: JobId, error: impl Into<String>) {
        let mut state = self.lock();
        state.current_job = Some(job_id);
        self.apply(
            &mut state,
            Some(job_id),
            ProgressEvent::Failed {
                error: error.into(),
            },
        );
    }

    /// The tracked job failed on the backend or its stream could not be
    /// kept alive.
    pub(crate) fn fail_job(&self, job_id: JobId, error: impl Into<String>) {
        let mut state = self.lock();
        if !Self::is_current(&state, job_id) {
            return;
        }
        self.apply(
            &mut state,
            Some(job_id),
            ProgressEvent::Failed {
                error: error.into(),
            },
        );
    }

    /// The submission itself failed; no job exists.
    pub(crate) fn fail_submission(&self, error: impl Into<String>) {
        let mut state = self.lock();
        state.current_job = None;
        self.apply(
            &mut state,
            None,
            ProgressEvent::Failed {
                error: error.into(),
            },
        );
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(state: &StoreState, job_id: JobId) -> bool {
        if state.current_job == Some(job_id) {
            return true;
        }
        tracing::debug!(
            job_id,
            current_job = ?state.current_job,
            "Ignoring event for a job that is not current",
        );
        false
    }

    /// Apply `event` and publish the new state. Returns whether the
    /// transition was accepted.
    fn apply(&self, state: &mut StoreState, job_id: Option<JobId>, event: ProgressEvent) -> bool {
        match state.progress.apply(event) {
            Ok(next) => {
                tracing::debug!(
                    job_id = ?job_id,
                    status = %next.status,
                    progress = next.progress,
                    "Progress updated",
                );
                state.progress = next.clone();
                // Zero receivers is fine.
                let _ = self.updates.send(ProgressUpdate {
                    job_id,
                    state: next,
                });
                true
            }
            Err(e) => {
                tracing::warn!(job_id = ?job_id, error = %e, "Rejected progress event");
                false
            }
        }
    }

    fn record_result(&self, state: &mut StoreState, result: GenerationResponse) {
        state.recent.push_front(result.clone());
        state.recent.truncate(self.recent_limit);
        state.current_result = Some(result);
    }
}

impl Default for GenerationStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use studio_core::generation::JobStatus;
    use studio_core::progress::ProgressStatus;

    use super::*;

    fn record(id: JobId) -> GenerationResponse {
        GenerationResponse {
            id,
            generation_type: "text-to-image".into(),
            status: JobStatus::Completed,
            output_path: None,
            output_url: Some(format!("https://cdn.test/{id}.png")),
            prompt: "a lighthouse".into(),
            parameters: serde_json::json!({}),
            created_at: None,
            completed_at: None,
            processing_time: Some(1.5),
            error_message: None,
        }
    }

    #[test]
    fn starts_idle_without_job() {
        let store = GenerationStore::default();
        assert_eq!(store.progress(), ProgressState::default());
        assert!(store.current_job().is_none());
        assert!(store.current_result().is_none());
        assert!(store.recent().is_empty());
    }

    #[tokio::test]
    async fn tracked_job_flow_publishes_each_transition() {
        let store = GenerationStore::default();
        let mut rx = store.subscribe();

        store.begin();
        store.accept(42);
        store.progress_for(42, 10.0, "Queued");
        store.progress_for(42, 55.0, "Sampling");
        store.complete(record(42));

        let mut statuses = Vec::new();
        while let Ok(update) = rx.try_recv() {
            statuses.push((update.state.status, update.state.progress));
        }
        assert_eq!(
            statuses,
            vec![
                (ProgressStatus::Idle, 0.0),
                (ProgressStatus::Generating, 0.0),
                (ProgressStatus::Generating, 10.0),
                (ProgressStatus::Generating, 55.0),
                (ProgressStatus::Completed, 100.0),
            ]
        );
        assert_eq!(store.current_result().map(|r| r.id), Some(42));
        assert_eq!(store.progress().message.as_deref(), Some("Sampling"));
    }

    #[test]
    fn events_for_other_jobs_are_ignored() {
        let store = GenerationStore::default();
        store.begin();
        store.accept(1);

        store.progress_for(2, 80.0, "Wrong job");
        store.complete(record(2));
        store.fail_job(2, "boom");

        let state = store.progress();
        assert_eq!(state.status, ProgressStatus::Generating);
        assert_eq!(state.progress, 0.0);
        assert!(store.current_result().is_none());
    }

    #[test]
    fn terminal_state_rejects_late_events() {
        let store = GenerationStore::default();
        store.begin();
        store.accept(5);
        store.complete(record(5));

        store.progress_for(5, 20.0, "late");
        store.fail_job(5, "late");

        let state = store.progress();
        assert_eq!(state.status, ProgressStatus::Completed);
        assert_eq!(state.progress, 100.0);
        assert_eq!(store.recent().len(), 1);
    }

    #[test]
    fn immediate_completion_records_result() {
        let store = GenerationStore::default();
        store.begin();
        store.complete_immediately(record(9));

        assert_eq!(store.progress().status, ProgressStatus::Completed);
        assert_eq!(store.current_job(), Some(9));
        assert_eq!(store.recent()[0].id, 9);
    }

    #[test]
    fn submission_failure_has_no_job() {
        let store = GenerationStore::default();
        store.begin();
        store.fail_submission("connection refused");

        let state = store.progress();
        assert_eq!(state.status, ProgressStatus::Error);
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.error.as_deref(), Some("connection refused"));
        assert!(store.current_job().is_none());
    }

    #[test]
    fn failed_response_binds_the_job() {
        let store = GenerationStore::default();
        store.begin();
        store.fail_immediately(3, "Out of credits");

        assert_eq!(store.current_job(), Some(3));
        assert_eq!(store.progress().status, ProgressStatus::Error);
    }

    #[test]
    fn recent_list_is_bounded_newest_first() {
        let store = GenerationStore::new(3);
        for id in 1..=5 {
            store.begin();
            store.complete_immediately(record(id));
        }

        let ids: Vec<JobId> = store.recent().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        store.clear_recent();
        assert!(store.recent().is_empty());
        assert_eq!(store.current_result().map(|r| r.id), Some(5));
    }

    #[test]
    fn begin_clears_previous_job() {
        let store = GenerationStore::default();
        store.begin();
        store.accept(1);
        store.fail_job(1, "boom");

        store.begin();
        assert_eq!(store.progress(), ProgressState::default());
        assert!(store.current_job().is_none());
    }

    #[tokio::test]
    async fn wait_for_terminal_returns_final_state() {
        let store = std::sync::Arc::new(GenerationStore::default());
        store.begin();
        store.accept(8);

        let waiter = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.wait_for_terminal().await })
        };
        tokio::task::yield_now().await;

        store.progress_for(8, 50.0, "Halfway");
        store.fail_job(8, "Out of credits");

        let state = waiter.await.unwrap();
        assert_eq!(state.status, ProgressStatus::Error);
        assert_eq!(state.error.as_deref(), Some("Out of credits"));
    }
}
