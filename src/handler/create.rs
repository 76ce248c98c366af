//! Create-mode pipeline: one new issue per message.

use std::sync::Arc;

use tracing::{info, warn};

use super::actors::{ActorResolver, ReporterResolution};
use super::context::HandlerContext;
use super::executor::{MutationExecutor, build_issue_input};
use super::locator::ProjectResolver;
use super::monitor::ErrorCollector;
use crate::backend::{AuthContext, IssueService, ProjectLookup, User, UserDirectory};
use crate::error::BackendError;
use crate::mail::IncomingMessage;

/// Coordinates a create-mode handler was configured with.
#[derive(Debug, Clone, Copy)]
pub struct CreateSettings<'a> {
    pub project_key: &'a str,
    pub issue_type_name: &'a str,
    pub default_reporter: &'a str,
    pub run_as: &'a str,
}

pub struct CreatePipeline {
    actors: ActorResolver,
    projects: ProjectResolver,
    executor: MutationExecutor,
}

impl CreatePipeline {
    pub fn new(
        projects: Arc<dyn ProjectLookup>,
        users: Arc<dyn UserDirectory>,
        service: Arc<dyn IssueService>,
        auth: Arc<dyn AuthContext>,
    ) -> Self {
        Self {
            actors: ActorResolver::new(users),
            projects: ProjectResolver::new(projects),
            executor: MutationExecutor::new(service, auth),
        }
    }

    /// Configuration-time check of operator, project, issue type and default
    /// reporter. Everything checkable is checked.
    pub async fn check(
        &self,
        settings: CreateSettings<'_>,
        collector: &dyn ErrorCollector,
    ) -> Result<(), BackendError> {
        match self.operator(settings.run_as, collector).await? {
            Some(operator) => {
                self.projects
                    .resolve_target(
                        &operator,
                        settings.project_key,
                        settings.issue_type_name,
                        collector,
                    )
                    .await?;
            }
            None => collector.warning(&format!(
                "Project '{}' was not checked without an operating user.",
                settings.project_key
            )),
        }

        if self
            .actors
            .resolve_named(settings.default_reporter)
            .await?
            .is_none()
        {
            collector.error(&format!(
                "Default reporter '{}' does not exist.",
                settings.default_reporter
            ));
        }
        Ok(())
    }

    /// `Ok(true)` once the issue has been committed (or simulated).
    ///
    /// Project and type are re-resolved for every message.
    pub async fn handle(
        &self,
        settings: CreateSettings<'_>,
        message: &IncomingMessage,
        context: &dyn HandlerContext,
    ) -> Result<bool, BackendError> {
        let monitor = context.monitor();

        let Some(operator) = self.operator(settings.run_as, monitor).await? else {
            return Ok(false);
        };

        let Some(target) = self
            .projects
            .resolve_target(
                &operator,
                settings.project_key,
                settings.issue_type_name,
                monitor,
            )
            .await?
        else {
            warn!(
                project = settings.project_key,
                issue_type = settings.issue_type_name,
                "Create target not found, message not handled"
            );
            return Ok(false);
        };

        let resolution = self
            .actors
            .resolve_reporter(message, settings.default_reporter)
            .await?;
        let Some(reporter) = resolution.user() else {
            let senders = message.sender_list();
            warn!(senders = %senders, "No reporter available, message not handled");
            monitor.error(&format!(
                "Message sender(s) '{senders}' do not have corresponding users and the default reporter '{}' does not exist. Message will be ignored.",
                settings.default_reporter
            ));
            return Ok(false);
        };
        if matches!(resolution, ReporterResolution::Fallback(_)) {
            monitor.info(&format!(
                "Sender '{}' is unknown, reporting as '{}'.",
                message.sender_list(),
                reporter.name
            ));
        }
        info!(
            reporter = %reporter.name,
            source = resolution.label(),
            "Incoming mail: using reporter"
        );

        let input = build_issue_input(message, reporter, &target);
        let mutation = self.executor.create_issue(context, &operator, input).await?;
        Ok(mutation.is_some())
    }

    async fn operator(
        &self,
        run_as: &str,
        collector: &dyn ErrorCollector,
    ) -> Result<Option<User>, BackendError> {
        match self.actors.resolve_operator(run_as).await? {
            None => {
                collector.error(&format!("Operating user '{run_as}' does not exist."));
                Ok(None)
            }
            Some(user) if !user.active => {
                collector.error(&format!("Operating user '{run_as}' is inactive."));
                Ok(None)
            }
            Some(user) => Ok(Some(user)),
        }
    }
}
