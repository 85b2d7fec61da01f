use std::fmt;
use std::io::{self, IsTerminal, Write};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Success => "✔",
            Severity::Error => "✖",
            Severity::Info => "ℹ",
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Severity::Success => "32",
            Severity::Error => "31",
            Severity::Info => "36",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
        };
        f.write_str(name)
    }
}

/// Receives short-lived user feedback. Implementations must not fail back
/// into the caller.
pub trait NotificationSink {
    fn notify(&mut self, message: &str, severity: Severity);
}

impl<N: NotificationSink + ?Sized> NotificationSink for &mut N {
    fn notify(&mut self, message: &str, severity: Severity) {
        (**self).notify(message, severity);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

/// Keeps every notification in arrival order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub notifications: Vec<Notification>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.notifications
            .iter()
            .map(|n| n.message.as_str())
            .collect()
    }

    pub fn last(&self) -> Option<&Notification> {
        self.notifications.last()
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, message: &str, severity: Severity) {
        self.notifications.push(Notification {
            message: message.to_string(),
            severity,
        });
    }
}

/// One-line toasts on stderr.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    color: bool,
}

impl TerminalSink {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stderr().is_terminal(),
        }
    }
}

impl NotificationSink for TerminalSink {
    fn notify(&mut self, message: &str, severity: Severity) {
        tracing::debug!(%severity, message, "notification");
        let line = if self.color {
            format!(
                "\x1b[{}m{}\x1b[0m {}",
                severity.color_code(),
                severity.icon(),
                message
            )
        } else {
            format!("{} {}", severity.icon(), message)
        };
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}
