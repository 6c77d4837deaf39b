use std::fmt;
#[cfg(test)]
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

/// A blocking, user-facing message (title + body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// Writes alerts to the log. The HTTP layer reports the same alert in the
/// error body, so nothing else needs to happen here.
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, alert: Alert) {
        warn!(title = %alert.title, message = %alert.message, "user alert");
    }
}

/// Keeps every alert in memory.
#[cfg(test)]
#[derive(Default)]
pub struct AlertLog {
    entries: Mutex<Vec<Alert>>,
}

#[cfg(test)]
impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Alert> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl AlertSink for AlertLog {
    fn alert(&self, alert: Alert) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert);
    }
}
