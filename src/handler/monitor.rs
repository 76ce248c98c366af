//! Error collectors — the user-visible side of handler diagnostics.
//!
//! Every entry is also mirrored to `tracing`, so an operator log gets the
//! same text the collector's reader sees.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

/// Severity of a collected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One collected diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorEntry {
    pub severity: Severity,
    pub message: String,
}

/// Append-only sink for human-readable diagnostics.
pub trait ErrorCollector: Send + Sync {
    fn error(&self, message: &str);
    fn warning(&self, message: &str);
    fn info(&self, message: &str);
    fn has_errors(&self) -> bool;
}

/// Which validation run a collector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Handler initialization against static parameters.
    Configuration,
    /// Per-message monitor.
    Message,
    /// Handler details form submitted by an operator.
    Form,
}

impl Destination {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Message => "message",
            Self::Form => "form",
        }
    }
}

/// In-memory collector used for every destination.
#[derive(Debug)]
pub struct Collector {
    destination: Destination,
    entries: Mutex<Vec<MonitorEntry>>,
}

impl Collector {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn configuration() -> Self {
        Self::new(Destination::Configuration)
    }

    pub fn message() -> Self {
        Self::new(Destination::Message)
    }

    pub fn form() -> Self {
        Self::new(Destination::Form)
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Snapshot of everything collected so far.
    pub fn entries(&self) -> Vec<MonitorEntry> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(Severity::Error)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages(Severity::Warning)
    }

    fn messages(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.clone())
            .collect()
    }

    fn push(&self, severity: Severity, message: &str) {
        self.lock().push(MonitorEntry {
            severity,
            message: message.to_string(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MonitorEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorCollector for Collector {
    fn error(&self, message: &str) {
        warn!(destination = self.destination.label(), "{message}");
        self.push(Severity::Error, message);
    }

    fn warning(&self, message: &str) {
        warn!(destination = self.destination.label(), "{message}");
        self.push(Severity::Warning, message);
    }

    fn info(&self, message: &str) {
        info!(destination = self.destination.label(), "{message}");
        self.push(Severity::Info, message);
    }

    fn has_errors(&self) -> bool {
        self.lock().iter().any(|e| e.severity == Severity::Error)
    }
}
