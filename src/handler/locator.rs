//! Record location — checks that configured coordinates exist right now.
//!
//! Nothing here caches: callers re-run these checks for every message,
//! because issues, projects and issue types can change between messages.

use std::sync::Arc;

use tracing::{debug, info};

use super::monitor::ErrorCollector;
use crate::backend::{Issue, IssueLookup, IssueType, Project, ProjectLookup, User};
use crate::error::BackendError;

/// Validates a configured issue key.
#[derive(Clone)]
pub struct IssueKeyValidator {
    issues: Arc<dyn IssueLookup>,
}

impl IssueKeyValidator {
    pub fn new(issues: Arc<dyn IssueLookup>) -> Self {
        Self { issues }
    }

    /// Look up `key`; report to `collector` and return `None` if it is gone.
    ///
    /// A blank key is not looked up. Reporting it is the caller's job.
    pub async fn validate_issue(
        &self,
        key: &str,
        collector: &dyn ErrorCollector,
    ) -> Result<Option<Issue>, BackendError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        let issue = self.issues.issue_by_key(key).await?;
        if issue.is_none() {
            collector.error(&format!(
                "Cannot add a comment from mail to issue '{key}'. The issue does not exist."
            ));
        }
        Ok(issue)
    }
}

/// A project plus the issue type new issues get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTarget {
    pub project: Project,
    pub issue_type: IssueType,
}

/// Case-insensitive exact match on the type name; first match wins.
pub fn resolve_issue_type(project: &Project, name: &str) -> Option<IssueType> {
    project
        .issue_types
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .cloned()
}

/// Resolves the project and issue type for create mode.
#[derive(Clone)]
pub struct ProjectResolver {
    projects: Arc<dyn ProjectLookup>,
}

impl ProjectResolver {
    pub fn new(projects: Arc<dyn ProjectLookup>) -> Self {
        Self { projects }
    }

    pub async fn resolve_project(
        &self,
        operator: &User,
        key: &str,
    ) -> Result<Option<Project>, BackendError> {
        self.projects.project_by_key(operator, key).await
    }

    /// Project and issue type together.
    ///
    /// A missing project or a missing type are reported separately; in both
    /// cases no target is returned, so no create request can be composed.
    pub async fn resolve_target(
        &self,
        operator: &User,
        project_key: &str,
        issue_type_name: &str,
        collector: &dyn ErrorCollector,
    ) -> Result<Option<CreateTarget>, BackendError> {
        let Some(project) = self.resolve_project(operator, project_key).await? else {
            collector.error(&format!("Project '{project_key}' does not exist."));
            return Ok(None);
        };
        info!(
            project = %project.name,
            project_id = project.id,
            "Incoming mail: using project"
        );

        let Some(issue_type) = resolve_issue_type(&project, issue_type_name) else {
            debug!(
                project = %project.key,
                available = project.issue_types.len(),
                "No matching issue type"
            );
            collector.error(&format!(
                "Issue type '{issue_type_name}' is not available in project '{project_key}'."
            ));
            return Ok(None);
        };
        info!(
            issue_type = %issue_type.name,
            issue_type_id = %issue_type.id,
            "Incoming mail: using issue type"
        );

        Ok(Some(CreateTarget {
            project,
            issue_type,
        }))
    }
}
