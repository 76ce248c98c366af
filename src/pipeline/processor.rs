//! Mail processor — the caller side of `MailHandler::handle`.
//!
//! Flow per message:
//! 1. Parse raw RFC 822 bytes into an `IncomingMessage`
//! 2. `MailHandler::handle()` with a fresh live or dry-run context
//! 3. Map the outcome to a `Disposition`
//!
//! A failing message never aborts a batch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backend::IssueService;
use crate::handler::{DryRunContext, LiveContext, MailHandler, MonitorEntry};
use crate::mail::IncomingMessage;
use crate::pipeline::types::{Disposition, ProcessedMessage, RawMail};

pub struct MailProcessor {
    handler: Arc<MailHandler>,
    service: Arc<dyn IssueService>,
    forward_address: Option<String>,
    dry_run: bool,
}

impl MailProcessor {
    pub fn new(handler: Arc<MailHandler>, service: Arc<dyn IssueService>) -> Self {
        Self {
            handler,
            service,
            forward_address: None,
            dry_run: false,
        }
    }

    /// Forward unhandled messages to `address` instead of leaving them.
    pub fn with_forward_address(mut self, address: Option<String>) -> Self {
        self.forward_address = address;
        self
    }

    /// Route mutations through a dry-run context.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process a single raw message.
    pub async fn process(&self, raw: RawMail) -> ProcessedMessage {
        let message = match IncomingMessage::parse(&raw.bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(id = %raw.id, error = %e, "Skipping unparseable mail");
                return finish(raw.id, Disposition::Failed { reason: e.to_string() }, Vec::new());
            }
        };

        let (outcome, diagnostics) = if self.dry_run {
            let ctx = DryRunContext::new();
            let outcome = self.handler.handle(&message, &ctx).await;
            (outcome, ctx.collector().entries())
        } else {
            let ctx = LiveContext::new(Arc::clone(&self.service));
            let outcome = self.handler.handle(&message, &ctx).await;
            (outcome, ctx.collector().entries())
        };

        let disposition = match outcome {
            Ok(handled) => Disposition::for_outcome(handled, self.forward_address.as_deref()),
            Err(e) => {
                error!(id = %raw.id, error = %e, "Failed to handle mail");
                Disposition::Failed {
                    reason: e.to_string(),
                }
            }
        };

        debug!(
            id = %raw.id,
            disposition = disposition.label(),
            diagnostics = diagnostics.len(),
            "Mail processed"
        );
        finish(raw.id, disposition, diagnostics)
    }

    /// Process messages one after another.
    pub async fn process_batch(&self, batch: Vec<RawMail>) -> Vec<ProcessedMessage> {
        let count = batch.len();
        info!(count, dry_run = self.dry_run, "Processing mail batch");

        let mut results = Vec::with_capacity(count);
        for raw in batch {
            results.push(self.process(raw).await);
        }

        let handled = results
            .iter()
            .filter(|r| r.disposition == Disposition::Delete)
            .count();
        info!(handled, total = count, "Batch processing complete");
        results
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

fn finish(id: String, disposition: Disposition, diagnostics: Vec<MonitorEntry>) -> ProcessedMessage {
    ProcessedMessage {
        id,
        disposition,
        diagnostics,
        processed_at: Utc::now(),
    }
}
