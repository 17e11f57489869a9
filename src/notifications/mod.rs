//! Notification sink
//!
//! Two kinds of events flow through here:
//!
//! - **Commit reports**: every write transaction in the store reports
//!   `(success, context, detail)` once it commits or rolls back.
//! - **Alerts**: the crawl scheduler reports failures that escaped a tick,
//!   and a critical notice when it gives up restarting.
//!
//! Delivery is fire-and-forget. A [`Notifier`] never returns an error to the
//! caller; sinks that talk to the network do so from a spawned task.
//!
//! # Sinks
//!
//! ```text
//!   Database / CrawlScheduler
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ FanoutNotifier  │
//!     └─────────────────┘
//!         │         │
//!         ▼         ▼
//!   ┌─────────┐ ┌─────────┐
//!   │   Log   │ │ Webhook │
//!   └─────────┘ └─────────┘
//! ```

pub mod webhook;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use webhook::{WebhookConfig, WebhookError, WebhookNotifier};

/// Severity level of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine events (successful commits)
    Info,
    /// Something failed but the system carries on
    Warning,
    /// Operator action required
    Critical,
}

impl Severity {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// What produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CommitSucceeded,
    CommitFailed,
    Alert,
}

/// A single event delivered to the sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        severity: Severity,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            severity,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// Outcome of a store commit attempt
    pub fn commit(success: bool, context: &str, detail: &str) -> Self {
        let body = if detail.is_empty() {
            context.to_string()
        } else {
            format!("{context}\n{detail}")
        };

        if success {
            Self::new(
                NotificationKind::CommitSucceeded,
                Severity::Info,
                "Database update succeeded",
                body,
            )
        } else {
            Self::new(
                NotificationKind::CommitFailed,
                Severity::Warning,
                "Database update failed",
                body,
            )
        }
    }

    /// Operator alert
    pub fn alert(severity: Severity, message: impl Into<String>) -> Self {
        let title = match severity {
            Severity::Critical => "Crawler stopped",
            _ => "Crawler error",
        };
        Self::new(NotificationKind::Alert, severity, title, message)
    }

    /// Render as a single chat message
    pub fn format_message(&self) -> String {
        format!(
            "[{}] {}\n{}\n({})",
            self.severity.as_str().to_uppercase(),
            self.title,
            self.body,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Destination for commit reports and alerts
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a notification; must not block on I/O
    fn notify(&self, notification: Notification);

    /// Report a commit attempt
    fn report(&self, success: bool, context: &str, detail: &str) {
        self.notify(Notification::commit(success, context, detail));
    }

    /// Report an error to the operator channel
    fn alert(&self, message: &str) {
        self.notify(Notification::alert(Severity::Warning, message));
    }
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => tracing::debug!(kind = ?n.kind, title = %n.title, "{}", n.body),
            Severity::Warning => tracing::warn!(kind = ?n.kind, title = %n.title, "{}", n.body),
            Severity::Critical => tracing::error!(kind = ?n.kind, title = %n.title, "{}", n.body),
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    received: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn count(&self, kind: NotificationKind) -> usize {
        self.received
            .lock()
            .map(|v| v.iter().filter(|n| n.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn successes(&self) -> usize {
        self.count(NotificationKind::CommitSucceeded)
    }

    pub fn failures(&self) -> usize {
        self.count(NotificationKind::CommitFailed)
    }

    pub fn alerts(&self) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Alert)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.received.lock() {
            v.clear();
        }
    }
}

impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    fn notify(&self, notification: Notification) {
        if let Ok(mut v) = self.received.lock() {
            v.push(notification);
        }
    }
}

/// Forwards every notification to several sinks
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_notification_severity() {
        let ok = Notification::commit(true, "User<discord_id=1>", "");
        assert_eq!(ok.severity, Severity::Info);
        assert_eq!(ok.body, "User<discord_id=1>");

        let failed = Notification::commit(false, "User<discord_id=1>", "UNIQUE constraint failed");
        assert_eq!(failed.kind, NotificationKind::CommitFailed);
        assert!(failed.body.ends_with("UNIQUE constraint failed"));
    }

    #[test]
    fn test_format_message() {
        let n = Notification::alert(Severity::Critical, "gave up after 5 failures");
        let msg = n.format_message();
        assert!(msg.starts_with("[CRITICAL] Crawler stopped"));
        assert!(msg.contains("gave up after 5 failures"));
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_memory_notifier_counts() {
        let sink = MemoryNotifier::new();
        sink.report(true, "a", "");
        sink.report(false, "b", "boom");
        sink.alert("tick failed");

        assert_eq!(sink.successes(), 1);
        assert_eq!(sink.failures(), 1);
        assert_eq!(sink.alerts().len(), 1);

        sink.clear();
        assert!(sink.notifications().is_empty());
    }

    #[test]
    fn test_fanout_delivers_to_every_sink() {
        let a = Arc::new(MemoryNotifier::new());
        let b = Arc::new(MemoryNotifier::new());
        let fanout = FanoutNotifier::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(LogNotifier::new()));

        fanout.alert("tick failed");

        assert_eq!(fanout.len(), 3);
        assert_eq!(a.alerts().len(), 1);
        assert_eq!(b.alerts().len(), 1);
    }
}
