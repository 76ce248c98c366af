//! In-memory issue tracker implementing every backend capability.
//!
//! Loaded from a JSON fixture (users, projects, issues). Used by the binary
//! for local runs and by the tests as the backend double.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::traits::{
    AuthContext, Comment, CreateValidationResult, Issue, IssueInput, IssueLookup, IssueService,
    Project, ProjectLookup, User, UserDirectory,
};
use crate::error::BackendError;

/// Longest summary the tracker accepts.
pub const MAX_SUMMARY_CHARS: usize = 255;

/// Serialized tracker contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerFixture {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Default)]
struct TrackerState {
    users: Vec<User>,
    projects: Vec<Project>,
    issues: Vec<Issue>,
    comments: Vec<Comment>,
    logged_in: Option<User>,
    next_issue_id: u64,
    next_comment_id: u64,
}

/// In-memory backend.
pub struct MemoryTracker {
    state: RwLock<TrackerState>,
    offline: AtomicBool,
    mutations: AtomicUsize,
}

impl MemoryTracker {
    /// Create a tracker from fixture data.
    pub fn new(fixture: TrackerFixture) -> Self {
        let next_issue_id = fixture.issues.iter().map(|i| i.id).max().unwrap_or(10_000) + 1;
        Self {
            state: RwLock::new(TrackerState {
                users: fixture.users,
                projects: fixture.projects,
                issues: fixture.issues,
                next_issue_id,
                next_comment_id: 1,
                ..Default::default()
            }),
            offline: AtomicBool::new(false),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Parse a JSON fixture.
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        let fixture: TrackerFixture = serde_json::from_str(json)?;
        Ok(Self::new(fixture))
    }

    /// Load a JSON fixture from disk.
    pub async fn from_file(path: &Path) -> Result<Self, BackendError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            BackendError::Fixture(format!("{}: {e}", path.display()))
        })?;
        let tracker = Self::from_json(&raw)?;
        info!(path = %path.display(), "Loaded tracker fixture");
        Ok(tracker)
    }

    /// Simulate a transport outage: every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Number of committed mutations (creates + comments).
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::Relaxed)
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.state.read().await.comments.clone()
    }

    pub async fn issues(&self) -> Vec<Issue> {
        self.state.read().await.issues.clone()
    }

    pub async fn logged_in_user(&self) -> Option<User> {
        self.state.read().await.logged_in.clone()
    }

    /// Delete an issue, as an operator would between two messages.
    pub async fn remove_issue(&self, key: &str) -> bool {
        let mut state = self.state.write().await;
        let before = state.issues.len();
        state.issues.retain(|i| i.key != key);
        state.issues.len() != before
    }

    /// Drop an issue type from a project.
    pub async fn remove_issue_type(&self, project_key: &str, type_name: &str) {
        let mut state = self.state.write().await;
        if let Some(project) = state.projects.iter_mut().find(|p| p.key == project_key) {
            project
                .issue_types
                .retain(|t| !t.name.eq_ignore_ascii_case(type_name));
        }
    }

    fn check_online(&self, operation: &str) -> Result<(), BackendError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable(format!(
                "tracker offline during {operation}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IssueLookup for MemoryTracker {
    async fn issue_by_key(&self, key: &str) -> Result<Option<Issue>, BackendError> {
        self.check_online("issue_by_key")?;
        let state = self.state.read().await;
        Ok(state.issues.iter().find(|i| i.key == key).cloned())
    }
}

#[async_trait]
impl ProjectLookup for MemoryTracker {
    async fn project_by_key(
        &self,
        operator: &User,
        key: &str,
    ) -> Result<Option<Project>, BackendError> {
        self.check_online("project_by_key")?;
        if !operator.active {
            return Err(BackendError::PermissionDenied {
                user: operator.name.clone(),
                reason: "user is inactive".into(),
            });
        }
        let state = self.state.read().await;
        Ok(state.projects.iter().find(|p| p.key == key).cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryTracker {
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, BackendError> {
        self.check_online("user_by_email")?;
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn user_by_name(&self, name: &str) -> Result<Option<User>, BackendError> {
        self.check_online("user_by_name")?;
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.name == name).cloned())
    }
}

#[async_trait]
impl IssueService for MemoryTracker {
    async fn validate_create(
        &self,
        operator: &User,
        input: IssueInput,
    ) -> Result<CreateValidationResult, BackendError> {
        self.check_online("validate_create")?;
        let state = self.state.read().await;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match state.users.iter().find(|u| u.key == operator.key) {
            None => errors.push(format!(
                "User '{}' does not exist and cannot create issues.",
                operator.name
            )),
            Some(user) if !user.active => errors.push(format!(
                "User '{}' is inactive and cannot create issues.",
                user.name
            )),
            Some(_) => {}
        }

        if input.summary.trim().is_empty() {
            errors.push("You must specify a summary of the issue.".into());
        } else if input.summary.chars().count() > MAX_SUMMARY_CHARS {
            errors.push(format!(
                "Summary must be less than {MAX_SUMMARY_CHARS} characters."
            ));
        }

        match state.users.iter().find(|u| u.name == input.reporter) {
            None => errors.push("The reporter specified is not a user.".into()),
            Some(user) if !user.active => {
                errors.push(format!("The reporter '{}' is inactive.", user.name));
            }
            Some(_) => {}
        }

        match state.projects.iter().find(|p| p.id == input.project_id) {
            None => errors.push(format!(
                "Project with id '{}' does not exist.",
                input.project_id
            )),
            Some(project) => {
                if !project.issue_types.iter().any(|t| t.id == input.issue_type_id) {
                    errors.push("The issue type selected is invalid.".into());
                }
            }
        }

        if input
            .description
            .as_deref()
            .is_none_or(|d| d.trim().is_empty())
        {
            warnings.push("Issue has no description.".into());
        }

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "Validated create request"
        );

        Ok(CreateValidationResult {
            input,
            errors,
            warnings,
        })
    }

    async fn create(
        &self,
        operator: &User,
        validated: CreateValidationResult,
    ) -> Result<Issue, BackendError> {
        self.check_online("create")?;
        if !validated.is_valid() {
            return Err(BackendError::RequestFailed {
                operation: "create".into(),
                reason: "validation result carries errors".into(),
            });
        }

        let mut state = self.state.write().await;
        if state.logged_in.as_ref().map(|u| &u.key) != Some(&operator.key) {
            return Err(BackendError::PermissionDenied {
                user: operator.name.clone(),
                reason: "not logged in".into(),
            });
        }
        let input = validated.input;
        let project_key = state
            .projects
            .iter()
            .find(|p| p.id == input.project_id)
            .map(|p| p.key.clone())
            .ok_or_else(|| BackendError::RequestFailed {
                operation: "create".into(),
                reason: format!("project {} disappeared", input.project_id),
            })?;

        let prefix = format!("{project_key}-");
        let sequence = state
            .issues
            .iter()
            .filter_map(|i| i.key.strip_prefix(&prefix)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = state.next_issue_id;
        state.next_issue_id += 1;

        let issue = Issue {
            id,
            key: format!("{project_key}-{sequence}"),
            project_id: input.project_id,
            issue_type_id: input.issue_type_id,
            summary: input.summary,
            description: input.description,
            reporter: input.reporter,
            created_at: Utc::now(),
        };
        state.issues.push(issue.clone());
        self.mutations.fetch_add(1, Ordering::Relaxed);

        info!(issue_key = %issue.key, operator = %operator.name, "Issue created");
        Ok(issue)
    }

    async fn add_comment(
        &self,
        issue: &Issue,
        author: &User,
        body: &str,
        notify: bool,
    ) -> Result<Comment, BackendError> {
        self.check_online("add_comment")?;
        let mut state = self.state.write().await;
        if !state.issues.iter().any(|i| i.key == issue.key) {
            return Err(BackendError::RequestFailed {
                operation: "add_comment".into(),
                reason: format!("issue {} no longer exists", issue.key),
            });
        }

        let comment = Comment {
            id: state.next_comment_id,
            issue_key: issue.key.clone(),
            author: author.name.clone(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        state.next_comment_id += 1;
        state.comments.push(comment.clone());
        self.mutations.fetch_add(1, Ordering::Relaxed);

        info!(
            issue_key = %issue.key,
            author = %author.name,
            notify,
            "Comment added"
        );
        Ok(comment)
    }
}

#[async_trait]
impl AuthContext for MemoryTracker {
    async fn set_logged_in_user(&self, user: &User) -> Result<(), BackendError> {
        self.check_online("set_logged_in_user")?;
        self.state.write().await.logged_in = Some(user.clone());
        Ok(())
    }
}
