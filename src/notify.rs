use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub const DEFAULT_DURATION_SECS: i64 = 5;

/// A dismissible, auto-expiring message shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub action: &'static str,
    pub issued_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Notification {
            message: message.into(),
            action: "Close",
            issued_at: Utc::now(),
            duration: Duration::seconds(DEFAULT_DURATION_SECS),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.issued_at + self.duration
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Used by the command-line front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        tracing::warn!(message = %n.message, "notification");
    }
}

/// Keeps notifications in memory until they expire.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    items: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications still visible at `now`; expired ones are dropped.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.retain(|n| !n.is_expired(now));
        items.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.active(Utc::now())
            .into_iter()
            .map(|n| n.message)
            .collect()
    }

    pub fn dismiss_all(&self) {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}
