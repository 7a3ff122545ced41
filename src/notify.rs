//! User-facing feedback for finished commands.
//!
//! Rendering belongs to the sink. This module only decides severity, text
//! and display duration, and guarantees one notification per outcome.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::dispatcher::PendingCommand;
use crate::error::ErrorKind;
use crate::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    #[ts(type = "number")]
    pub duration_ms: u64,
}

/// How long each severity stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastDurations {
    pub success_ms: u64,
    pub warning_ms: u64,
    pub error_ms: u64,
}

impl Default for ToastDurations {
    fn default() -> Self {
        Self {
            success_ms: 3_000,
            warning_ms: 5_000,
            error_ms: 7_000,
        }
    }
}

impl ToastDurations {
    fn for_severity(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Success => self.success_ms,
            Severity::Warning => self.warning_ms,
            Severity::Error => self.error_ms,
        }
    }
}

/// Renders notifications (toast, log line, terminal).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes notifications to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Success => tracing::info!(duration_ms = n.duration_ms, "{}", n.message),
            Severity::Warning => tracing::warn!(duration_ms = n.duration_ms, "{}", n.message),
            Severity::Error => tracing::error!(duration_ms = n.duration_ms, "{}", n.message),
        }
    }
}

/// Turns outcomes into exactly one notification each.
pub struct Notifier<S> {
    sink: S,
    durations: ToastDurations,
}

impl<S: NotificationSink> Notifier<S> {
    pub fn new(sink: S) -> Self {
        Self::with_durations(sink, ToastDurations::default())
    }

    pub fn with_durations(sink: S, durations: ToastDurations) -> Self {
        Self { sink, durations }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Build the notification for an outcome without emitting it.
    pub fn notification_for(&self, outcome: &Outcome, success_message: &str) -> Notification {
        let (severity, message) = if outcome.ok {
            (Severity::Success, success_message.to_string())
        } else {
            let kind = outcome.error_kind;
            let severity = if kind == Some(ErrorKind::Cancelled) {
                Severity::Warning
            } else {
                Severity::Error
            };
            let message = outcome
                .message
                .clone()
                .unwrap_or_else(|| format!("Command failed ({})", kind.map_or("unknown", ErrorKind::label)));
            (severity, message)
        };
        Notification {
            severity,
            message,
            duration_ms: self.durations.for_severity(severity),
        }
    }

    /// Emit one notification for `outcome`.
    pub fn report(&self, outcome: &Outcome, success_message: &str) -> Notification {
        let notification = self.notification_for(outcome, success_message);
        self.sink.notify(notification.clone());
        notification
    }

    /// Await a pending command and report its outcome once.
    pub async fn run(&self, pending: PendingCommand, success_message: &str) -> Outcome {
        let outcome = Outcome::from(pending.await);
        self.report(&outcome, success_message);
        outcome
    }
}
