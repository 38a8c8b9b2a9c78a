//! Notification sink: where orchestration outcomes surface.

use std::sync::Mutex;
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Receives log records and user-facing notices
pub trait NotificationSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str, detail: Option<&str>);

    fn notify(&self, message: &str);
}

/// Sink writing to `tracing`. Notices go to the `registrysync::notice` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn log(&self, severity: Severity, message: &str, detail: Option<&str>) {
        let detail = detail.unwrap_or("");
        match severity {
            Severity::Info => event!(Level::INFO, detail, "{}", message),
            Severity::Warning => event!(Level::WARN, detail, "{}", message),
            Severity::Error => event!(Level::ERROR, detail, "{}", message),
        }
    }

    fn notify(&self, message: &str) {
        event!(target: "registrysync::notice", Level::INFO, "{}", message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Log {
        severity: Severity,
        message: String,
        detail: Option<String>,
    },
    User(String),
}

/// Sink keeping everything in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Notice>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    /// Messages of log records, in order
    pub fn log_messages(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|n| match n {
                Notice::Log { message, .. } => Some(message.clone()),
                Notice::User(_) => None,
            })
            .collect()
    }

    pub fn user_notices(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|n| match n {
                Notice::User(message) => Some(message.clone()),
                Notice::Log { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notice>> {
        // entries are append-only, a poisoned lock still holds valid data
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NotificationSink for MemorySink {
    fn log(&self, severity: Severity, message: &str, detail: Option<&str>) {
        self.lock().push(Notice::Log {
            severity,
            message: message.to_string(),
            detail: detail.map(str::to_string),
        });
    }

    fn notify(&self, message: &str) {
        self.lock().push(Notice::User(message.to_string()));
    }
}
