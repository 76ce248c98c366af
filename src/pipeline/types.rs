//! Shared types for the batch pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::handler::MonitorEntry;

// ── Raw mail ────────────────────────────────────────────────────────

/// An undecoded message as delivered by the mail transport.
#[derive(Debug, Clone)]
pub struct RawMail {
    /// Transport-side identifier (file name, UID, ...).
    pub id: String,
    pub bytes: Vec<u8>,
}

impl RawMail {
    pub fn new(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Raw mail without a transport identifier; one is generated.
    pub fn anonymous(bytes: Vec<u8>) -> Self {
        Self::new(format!("gen-{}", Uuid::new_v4()), bytes)
    }
}

// ── Disposition ─────────────────────────────────────────────────────

/// What the transport should do with a message after handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Handled; remove it from the queue.
    Delete,
    /// Not handled; forward it for manual processing.
    Forward { to: String },
    /// Not handled and no forward address; leave it in the queue.
    Leave,
    /// Transport or parse failure; the message stays where it is.
    Failed { reason: String },
}

impl Disposition {
    /// Map a handler outcome to a disposition.
    pub fn for_outcome(handled: bool, forward_address: Option<&str>) -> Self {
        match (handled, forward_address) {
            (true, _) => Self::Delete,
            (false, Some(to)) => Self::Forward { to: to.to_string() },
            (false, None) => Self::Leave,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Forward { .. } => "forward",
            Self::Leave => "leave",
            Self::Failed { .. } => "failed",
        }
    }
}

// ── Processed message ───────────────────────────────────────────────

/// Result of running one message through the handler.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMessage {
    pub id: String,
    pub disposition: Disposition,
    /// Everything the per-message monitor collected.
    pub diagnostics: Vec<MonitorEntry>,
    pub processed_at: DateTime<Utc>,
}
