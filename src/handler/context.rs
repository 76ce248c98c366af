//! Handler contexts — where mutations go and where diagnostics land.
//!
//! A live context writes to the backend. A dry-run context records what
//! would have been written, so a configuration can be tried from the
//! operator screen without touching any issue.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::monitor::{Collector, ErrorCollector};
use crate::backend::{Comment, CreateValidationResult, Issue, IssueInput, IssueService, User};
use crate::error::BackendError;

/// Result of a mutation dispatched through a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Commented(Comment),
    Created(Issue),
    Simulated(DryRunAction),
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Commented(_) => "commented",
            Self::Created(_) => "created",
            Self::Simulated(_) => "simulated",
        }
    }
}

/// A mutation recorded by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DryRunAction {
    Comment {
        issue_key: String,
        author: String,
        body: String,
        notify: bool,
    },
    Create {
        operator: String,
        input: IssueInput,
    },
}

/// Per-message environment handed to `MailHandler::handle`.
#[async_trait]
pub trait HandlerContext: Send + Sync {
    /// Monitor receiving per-message diagnostics.
    fn monitor(&self) -> &dyn ErrorCollector;

    /// `false` for dry runs.
    fn is_real_run(&self) -> bool;

    async fn create_comment(
        &self,
        issue: &Issue,
        author: &User,
        body: &str,
        notify: bool,
    ) -> Result<Mutation, BackendError>;

    /// Commit a validated create request.
    async fn create_issue(
        &self,
        operator: &User,
        validated: CreateValidationResult,
    ) -> Result<Mutation, BackendError>;
}

// ── Live ────────────────────────────────────────────────────────────

/// Dispatches mutations to the backend.
pub struct LiveContext {
    service: Arc<dyn IssueService>,
    monitor: Collector,
}

impl LiveContext {
    pub fn new(service: Arc<dyn IssueService>) -> Self {
        Self {
            service,
            monitor: Collector::message(),
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.monitor
    }
}

#[async_trait]
impl HandlerContext for LiveContext {
    fn monitor(&self) -> &dyn ErrorCollector {
        &self.monitor
    }

    fn is_real_run(&self) -> bool {
        true
    }

    async fn create_comment(
        &self,
        issue: &Issue,
        author: &User,
        body: &str,
        notify: bool,
    ) -> Result<Mutation, BackendError> {
        let comment = self.service.add_comment(issue, author, body, notify).await?;
        Ok(Mutation::Commented(comment))
    }

    async fn create_issue(
        &self,
        operator: &User,
        validated: CreateValidationResult,
    ) -> Result<Mutation, BackendError> {
        let issue = self.service.create(operator, validated).await?;
        Ok(Mutation::Created(issue))
    }
}

// ── Dry run ─────────────────────────────────────────────────────────

/// Records mutations instead of performing them.
#[derive(Debug)]
pub struct DryRunContext {
    monitor: Collector,
    actions: Mutex<Vec<DryRunAction>>,
}

impl DryRunContext {
    pub fn new() -> Self {
        Self {
            monitor: Collector::message(),
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.monitor
    }

    pub fn actions(&self) -> Vec<DryRunAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, action: DryRunAction) -> Mutation {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        Mutation::Simulated(action)
    }
}

impl Default for DryRunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HandlerContext for DryRunContext {
    fn monitor(&self) -> &dyn ErrorCollector {
        &self.monitor
    }

    fn is_real_run(&self) -> bool {
        false
    }

    async fn create_comment(
        &self,
        issue: &Issue,
        author: &User,
        body: &str,
        notify: bool,
    ) -> Result<Mutation, BackendError> {
        info!(issue_key = %issue.key, author = %author.name, "Dry run: would add comment");
        self.monitor.info(&format!(
            "Would add a comment to {} as {}.",
            issue.key, author.name
        ));
        Ok(self.record(DryRunAction::Comment {
            issue_key: issue.key.clone(),
            author: author.name.clone(),
            body: body.to_string(),
            notify,
        }))
    }

    async fn create_issue(
        &self,
        operator: &User,
        validated: CreateValidationResult,
    ) -> Result<Mutation, BackendError> {
        info!(operator = %operator.name, "Dry run: would create issue");
        self.monitor.info(&format!(
            "Would create issue '{}' reported by {}.",
            validated.input.summary, validated.input.reporter
        ));
        Ok(self.record(DryRunAction::Create {
            operator: operator.name.clone(),
            input: validated.input,
        }))
    }
}
