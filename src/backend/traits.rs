//! Capability traits for the issue-tracking backend.
//!
//! Each pipeline depends only on the capabilities it uses: comment mode needs
//! `IssueLookup` + `UserDirectory` + `IssueService`; create mode needs
//! `ProjectLookup` + `UserDirectory` + `IssueService` + `AuthContext`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

// ── Model ───────────────────────────────────────────────────────────

/// A backend user (reporter, comment author or operating identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user key.
    pub key: String,
    /// Login name.
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// A classification of issues inside a project (e.g. "Task").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub name: String,
}

/// A project: groups issues and owns the set of issue types it allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub issue_types: Vec<IssueType>,
}

/// An existing issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub key: String,
    pub project_id: u64,
    pub issue_type_id: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub reporter: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// A comment appended to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub issue_key: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Input parameters for a new issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInput {
    pub summary: String,
    pub description: Option<String>,
    /// Reporter login name.
    pub reporter: String,
    pub project_id: u64,
    pub issue_type_id: String,
}

impl IssueInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = reporter.into();
        self
    }

    pub fn with_project_id(mut self, project_id: u64) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_issue_type_id(mut self, issue_type_id: impl Into<String>) -> Self {
        self.issue_type_id = issue_type_id.into();
        self
    }
}

/// Outcome of the validation phase of a two-phase create.
///
/// Only a result without errors may be committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateValidationResult {
    pub input: IssueInput,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CreateValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// ── Capabilities ────────────────────────────────────────────────────

/// Look up existing issues by key.
#[async_trait]
pub trait IssueLookup: Send + Sync {
    async fn issue_by_key(&self, key: &str) -> Result<Option<Issue>, BackendError>;
}

/// Look up projects as seen by an operating user.
#[async_trait]
pub trait ProjectLookup: Send + Sync {
    async fn project_by_key(
        &self,
        operator: &User,
        key: &str,
    ) -> Result<Option<Project>, BackendError>;
}

/// The backend's user space.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact match on the email address.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, BackendError>;

    /// Exact match on the login name.
    async fn user_by_name(&self, name: &str) -> Result<Option<User>, BackendError>;
}

/// Mutating operations.
#[async_trait]
pub trait IssueService: Send + Sync {
    /// Validate a create request on behalf of `operator`. Never mutates.
    async fn validate_create(
        &self,
        operator: &User,
        input: IssueInput,
    ) -> Result<CreateValidationResult, BackendError>;

    /// Commit a previously validated create request.
    async fn create(
        &self,
        operator: &User,
        validated: CreateValidationResult,
    ) -> Result<Issue, BackendError>;

    /// Append a comment. `notify` controls outbound notifications.
    async fn add_comment(
        &self,
        issue: &Issue,
        author: &User,
        body: &str,
        notify: bool,
    ) -> Result<Comment, BackendError>;
}

/// The backend's authenticated-session context.
#[async_trait]
pub trait AuthContext: Send + Sync {
    async fn set_logged_in_user(&self, user: &User) -> Result<(), BackendError>;
}
