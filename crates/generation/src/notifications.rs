//! Short-lived user notifications.
//!
//! Each entry removes itself after the configured TTL. The expiry runs on
//! a spawned task that holds a [`CancellationToken`]; removing or clearing
//! an entry cancels its timer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Buffer capacity for the "added" broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    notification: Notification,
    expiry: CancellationToken,
}

/// Live notifications, oldest first.
pub struct NotificationCenter {
    entries: Arc<Mutex<Vec<Entry>>>,
    ttl: Duration,
    added: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    /// Create a center whose entries expire after `ttl`. A zero `ttl`
    /// keeps entries until they are removed.
    pub fn new(ttl: Duration) -> Self {
        let (added, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            ttl,
            added,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Add a notification and schedule its expiry. Must be called within a
    /// Tokio runtime when the TTL is non-zero.
    pub fn add(&self, kind: NotificationKind, message: impl Into<String>) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = notification.id;
        let expiry = CancellationToken::new();

        tracing::debug!(%id, ?kind, text = %notification.message, "Notification added");

        lock(&self.entries).push(Entry {
            notification: notification.clone(),
            expiry: expiry.clone(),
        });
        let _ = self.added.send(notification);

        if !self.ttl.is_zero() {
            let entries = Arc::clone(&self.entries);
            let ttl = self.ttl;
            tokio::spawn(async move {
                tokio::select! {
                    _ = expiry.cancelled() => {}
                    _ = tokio::time::sleep(ttl) => {
                        lock(&entries).retain(|e| e.notification.id != id);
                        tracing::trace!(%id, "Notification expired");
                    }
                }
            });
        }

        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.add(NotificationKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.add(NotificationKind::Error, message)
    }

    /// Remove one notification and cancel its expiry timer. Returns whether
    /// it was still listed.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut entries = lock(&self.entries);
        match entries.iter().position(|e| e.notification.id == id) {
            Some(index) => {
                entries.remove(index).expiry.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove every notification and cancel all pending timers.
    pub fn clear(&self) {
        for entry in lock(&self.entries).drain(..) {
            entry.expiry.cancel();
        }
    }

    pub fn list(&self) -> Vec<Notification> {
        lock(&self.entries)
            .iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    /// Receive every notification added from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.added.subscribe()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

fn lock(entries: &Mutex<Vec<Entry>>) -> MutexGuard<'_, Vec<Entry>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
