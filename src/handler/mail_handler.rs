//! The handler: initialization once, then one `handle` call per message.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::comment::CommentPipeline;
use super::context::HandlerContext;
use super::create::{CreatePipeline, CreateSettings};
use super::monitor::ErrorCollector;
use crate::backend::{AuthContext, IssueLookup, IssueService, ProjectLookup, UserDirectory};
use crate::config::{HandlerMode, HandlerParams, ModeKind};
use crate::error::HandlerError;
use crate::mail::IncomingMessage;

/// Lifecycle of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerState {
    /// Not initialized, or required parameters missing.
    Unconfigured,
    /// Parameters valid; existence checks pending.
    Configured(HandlerMode),
    /// Initialization finished; messages may be handled.
    Ready(HandlerMode),
}

impl HandlerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured(_) => "configured",
            Self::Ready(_) => "ready",
        }
    }
}

/// The pipeline a handler was built for.
pub enum Pipeline {
    Comment(CommentPipeline),
    Create(CreatePipeline),
}

impl Pipeline {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Comment(_) => ModeKind::Comment,
            Self::Create(_) => ModeKind::Create,
        }
    }
}

/// Turns inbound mail into comments or new issues.
pub struct MailHandler {
    pipeline: Pipeline,
    params: HandlerParams,
    state: HandlerState,
}

impl MailHandler {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            params: HandlerParams::default(),
            state: HandlerState::Unconfigured,
        }
    }

    pub fn comment(issues: Arc<dyn IssueLookup>, users: Arc<dyn UserDirectory>) -> Self {
        Self::new(Pipeline::Comment(CommentPipeline::new(issues, users)))
    }

    pub fn create(
        projects: Arc<dyn ProjectLookup>,
        users: Arc<dyn UserDirectory>,
        service: Arc<dyn IssueService>,
        auth: Arc<dyn AuthContext>,
    ) -> Self {
        Self::new(Pipeline::Create(CreatePipeline::new(
            projects, users, service, auth,
        )))
    }

    /// Build a handler of `kind` from a backend implementing every capability.
    pub fn from_backend<B>(kind: ModeKind, backend: Arc<B>) -> Self
    where
        B: IssueLookup + ProjectLookup + UserDirectory + IssueService + AuthContext + 'static,
    {
        match kind {
            ModeKind::Comment => Self::comment(backend.clone(), backend),
            ModeKind::Create => {
                Self::create(backend.clone(), backend.clone(), backend.clone(), backend)
            }
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.pipeline.kind()
    }

    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    pub fn params(&self) -> &HandlerParams {
        &self.params
    }

    /// The validated mode, once ready.
    pub fn mode(&self) -> Option<&HandlerMode> {
        match &self.state {
            HandlerState::Ready(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Read and check the parameters.
    ///
    /// Never fails: every problem goes to `collector`. Existence checks are
    /// best effort and do not keep the handler from becoming ready.
    pub async fn initialize(&mut self, params: HandlerParams, collector: &dyn ErrorCollector) {
        self.params = params;
        self.state = HandlerState::Unconfigured;

        let Some(mode) = HandlerMode::from_params(self.kind(), &self.params, collector) else {
            warn!(mode = self.kind().label(), "Handler parameters incomplete");
            return;
        };
        self.state = HandlerState::Configured(mode.clone());
        debug!(mode = self.kind().label(), "Handler parameters accepted");

        let checked = match (&self.pipeline, &mode) {
            (Pipeline::Comment(pipeline), HandlerMode::Comment { issue_key, .. }) => {
                pipeline.check(issue_key, collector).await
            }
            (
                Pipeline::Create(pipeline),
                HandlerMode::Create {
                    project_key,
                    issue_type_name,
                    default_reporter,
                    run_as,
                },
            ) => {
                let settings = CreateSettings {
                    project_key,
                    issue_type_name,
                    default_reporter,
                    run_as,
                };
                pipeline.check(settings, collector).await
            }
            _ => Ok(()),
        };
        if let Err(e) = checked {
            error!(error = %e, "Configuration check failed");
            collector.error(&format!("Could not verify the handler configuration: {e}"));
        }

        self.state = HandlerState::Ready(mode);
        info!(mode = self.kind().label(), "Mail handler ready");
    }

    /// Handle one message.
    ///
    /// `Ok(true)` only when the mutation went through. `Ok(false)` means the
    /// message could not be handled (details are in the context's monitor)
    /// and the caller decides whether to forward, keep or drop it.
    pub async fn handle(
        &self,
        message: &IncomingMessage,
        context: &dyn HandlerContext,
    ) -> Result<bool, HandlerError> {
        let HandlerState::Ready(mode) = &self.state else {
            return Err(HandlerError::NotReady(format!(
                "handler is {}; initialize it with complete parameters first",
                self.state.label()
            )));
        };

        info!(
            mode = self.kind().label(),
            message_id = message.message_id.as_deref().unwrap_or("-"),
            sender = %message.sender_list(),
            real_run = context.is_real_run(),
            "Handling incoming mail"
        );

        let handled = match (&self.pipeline, mode) {
            (Pipeline::Comment(pipeline), HandlerMode::Comment { issue_key, notify }) => {
                pipeline.handle(issue_key, *notify, message, context).await?
            }
            (
                Pipeline::Create(pipeline),
                HandlerMode::Create {
                    project_key,
                    issue_type_name,
                    default_reporter,
                    run_as,
                },
            ) => {
                let settings = CreateSettings {
                    project_key,
                    issue_type_name,
                    default_reporter,
                    run_as,
                };
                pipeline.handle(settings, message, context).await?
            }
            _ => {
                return Err(HandlerError::NotReady(
                    "handler mode does not match its pipeline".into(),
                ));
            }
        };

        debug!(handled, "Incoming mail processed");
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Issue, IssueType, MemoryTracker, Project, TrackerFixture, User};
    use crate::handler::context::{DryRunContext, LiveContext};
    use crate::handler::monitor::Collector;
    use crate::mail::MailAddress;

    fn user(name: &str) -> User {
        User {
            key: format!("key-{name}"),
            name: name.into(),
            email: format!("{name}@example.com"),
            display_name: None,
            active: true,
        }
    }

    fn tracker() -> Arc<MemoryTracker> {
        Arc::new(MemoryTracker::new(TrackerFixture {
            users: vec![user("admin"), user("alice"), user("bob")],
            projects: vec![Project {
                id: 10000,
                key: "TEST".into(),
                name: "Test".into(),
                issue_types: vec![
                    IssueType {
                        id: "1".into(),
                        name: "Bug".into(),
                    },
                    IssueType {
                        id: "3".into(),
                        name: "Task".into(),
                    },
                ],
            }],
            issues: vec![Issue {
                id: 10001,
                key: "TEST-1".into(),
                project_id: 10000,
                issue_type_id: "3".into(),
                summary: "Support inbox".into(),
                description: None,
                reporter: "admin".into(),
                created_at: chrono::Utc::now(),
            }],
        }))
    }

    fn mail(from: &str, subject: &str) -> IncomingMessage {
        IncomingMessage::new()
            .with_subject(subject)
            .with_body("Details inside")
            .with_sender(MailAddress::new(from))
    }

    fn create_params(project: &str, issue_type: &str, reporter: &str) -> HandlerParams {
        HandlerParams::from_map([
            ("projectKey", project),
            ("issueTypeName", issue_type),
            ("reporterDefaultName", reporter),
        ])
    }

    async fn ready(kind: ModeKind, backend: Arc<MemoryTracker>, params: HandlerParams) -> MailHandler {
        let mut handler = MailHandler::from_backend(kind, backend);
        handler.initialize(params, &Collector::configuration()).await;
        handler
    }

    // ── Initialization ──────────────────────────────────────────────

    #[tokio::test]
    async fn initialize_reports_each_missing_key_and_stays_unconfigured() {
        let mut handler = MailHandler::from_backend(ModeKind::Create, tracker());
        let collector = Collector::configuration();
        handler
            .initialize(HandlerParams::from_map([("projectKey", "TEST")]), &collector)
            .await;
        assert_eq!(handler.state(), &HandlerState::Unconfigured);
        assert_eq!(collector.errors().len(), 2);
    }

    #[tokio::test]
    async fn initialize_comment_mode_reports_missing_issue_but_is_ready() {
        let mut handler = MailHandler::from_backend(ModeKind::Comment, tracker());
        let collector = Collector::configuration();
        handler
            .initialize(HandlerParams::from_map([("issueKey", "TEST-9")]), &collector)
            .await;
        assert_eq!(handler.state().label(), "ready");
        assert_eq!(
            collector.errors(),
            vec!["Cannot add a comment from mail to issue 'TEST-9'. The issue does not exist."]
        );
    }

    #[tokio::test]
    async fn initialize_create_mode_checks_everything() {
        let mut handler = MailHandler::from_backend(ModeKind::Create, tracker());
        let collector = Collector::configuration();
        handler
            .initialize(create_params("TEST", "Epic", "carol"), &collector)
            .await;
        assert!(handler.mode().is_some());
        assert_eq!(
            collector.errors(),
            vec![
                "Issue type 'Epic' is not available in project 'TEST'.",
                "Default reporter 'carol' does not exist.",
            ]
        );
    }

    #[tokio::test]
    async fn initialize_reports_transport_failure_without_failing() {
        let backend = tracker();
        backend.set_offline(true);
        let mut handler = MailHandler::from_backend(ModeKind::Comment, backend);
        let collector = Collector::configuration();
        handler
            .initialize(HandlerParams::from_map([("issueKey", "TEST-1")]), &collector)
            .await;
        assert!(handler.mode().is_some());
        assert!(collector.errors()[0].starts_with("Could not verify the handler configuration"));
    }

    #[tokio::test]
    async fn handle_before_initialize_fails_fast() {
        let backend = tracker();
        let handler = MailHandler::from_backend(ModeKind::Comment, backend.clone());
        let ctx = LiveContext::new(backend.clone());
        let err = handler
            .handle(&mail("alice@example.com", "Help"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotReady(_)));
        assert_eq!(backend.mutation_count(), 0);
    }

    // ── Comment mode ────────────────────────────────────────────────

    #[tokio::test]
    async fn comment_mode_appends_comment() {
        let backend = tracker();
        let handler = ready(
            ModeKind::Comment,
            backend.clone(),
            HandlerParams::from_map([("issueKey", "TEST-1")]),
        )
        .await;
        let ctx = LiveContext::new(backend.clone());

        let handled = handler
            .handle(&mail("alice@example.com", "Help"), &ctx)
            .await
            .unwrap();
        assert!(handled);
        let comments = backend.comments().await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, "alice");
        assert_eq!(comments[0].body, "Help\nDetails inside");
    }

    #[tokio::test]
    async fn comment_mode_unknown_sender_is_not_handled() {
        let backend = tracker();
        let handler = ready(
            ModeKind::Comment,
            backend.clone(),
            HandlerParams::from_map([("issueKey", "TEST-1")]),
        )
        .await;
        let ctx = LiveContext::new(backend.clone());

        let handled = handler
            .handle(&mail("stranger@example.com", "Hi"), &ctx)
            .await
            .unwrap();
        assert!(!handled);
        assert_eq!(backend.mutation_count(), 0);
        assert_eq!(
            ctx.collector().errors(),
            vec!["Message sender(s) 'stranger@example.com' do not have corresponding users. Message will be ignored."]
        );
    }

    #[tokio::test]
    async fn comment_mode_rechecks_issue_every_message() {
        let backend = tracker();
        let handler = ready(
            ModeKind::Comment,
            backend.clone(),
            HandlerParams::from_map([("issueKey", "TEST-1")]),
        )
        .await;

        let first = LiveContext::new(backend.clone());
        assert!(handler.handle(&mail("alice@example.com", "One"), &first).await.unwrap());

        backend.remove_issue("TEST-1").await;
        let second = LiveContext::new(backend.clone());
        assert!(!handler.handle(&mail("alice@example.com", "Two"), &second).await.unwrap());
        assert_eq!(second.collector().errors().len(), 1);
        assert_eq!(backend.mutation_count(), 1);
    }

    #[tokio::test]
    async fn comment_mode_transport_error_propagates() {
        let backend = tracker();
        let handler = ready(
            ModeKind::Comment,
            backend.clone(),
            HandlerParams::from_map([("issueKey", "TEST-1")]),
        )
        .await;
        backend.set_offline(true);
        let ctx = LiveContext::new(backend.clone());
        let err = handler
            .handle(&mail("alice@example.com", "Help"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Backend(_)));
    }

    // ── Create mode ─────────────────────────────────────────────────

    #[tokio::test]
    async fn create_mode_uses_sender_as_reporter() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "task", "bob")).await;
        let ctx = LiveContext::new(backend.clone());

        assert!(handler.handle(&mail("alice@example.com", "New laptop"), &ctx).await.unwrap());
        let issues = backend.issues().await;
        let created = issues.iter().find(|i| i.summary == "New laptop").unwrap();
        assert_eq!(created.reporter, "alice");
        assert_eq!(created.issue_type_id, "3");
    }

    #[tokio::test]
    async fn create_mode_falls_back_to_default_reporter() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "Task", "bob")).await;
        let ctx = LiveContext::new(backend.clone());

        assert!(handler.handle(&mail("stranger@example.com", "Hello"), &ctx).await.unwrap());
        let issues = backend.issues().await;
        let created = issues.iter().find(|i| i.summary == "Hello").unwrap();
        assert_eq!(created.reporter, "bob");
    }

    #[tokio::test]
    async fn create_mode_without_any_reporter_is_not_handled() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "Task", "carol")).await;
        let ctx = LiveContext::new(backend.clone());

        assert!(!handler.handle(&mail("stranger@example.com", "Hello"), &ctx).await.unwrap());
        assert_eq!(backend.mutation_count(), 0);
        assert!(ctx.collector().errors()[0].contains("default reporter 'carol' does not exist"));
    }

    #[tokio::test]
    async fn create_mode_missing_type_short_circuits() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "Task", "bob")).await;
        backend.remove_issue_type("TEST", "Task").await;
        let ctx = LiveContext::new(backend.clone());

        assert!(!handler.handle(&mail("alice@example.com", "Hello"), &ctx).await.unwrap());
        assert_eq!(backend.mutation_count(), 0);
        assert_eq!(
            ctx.collector().errors(),
            vec!["Issue type 'Task' is not available in project 'TEST'."]
        );
    }

    #[tokio::test]
    async fn create_mode_unknown_operator_is_not_handled() {
        let backend = tracker();
        let params = HandlerParams::from_map([
            ("projectKey", "TEST"),
            ("issueTypeName", "Task"),
            ("reporterDefaultName", "bob"),
            ("runAsUser", "root"),
        ]);
        let handler = ready(ModeKind::Create, backend.clone(), params).await;
        let ctx = LiveContext::new(backend.clone());

        assert!(!handler.handle(&mail("alice@example.com", "Hello"), &ctx).await.unwrap());
        assert_eq!(ctx.collector().errors(), vec!["Operating user 'root' does not exist."]);
    }

    #[tokio::test]
    async fn create_mode_inactive_operator_is_not_handled() {
        let mut admin = user("admin");
        admin.active = false;
        let backend = Arc::new(MemoryTracker::new(TrackerFixture {
            users: vec![admin, user("alice"), user("bob")],
            projects: vec![Project {
                id: 10000,
                key: "TEST".into(),
                name: "Test".into(),
                issue_types: vec![IssueType {
                    id: "3".into(),
                    name: "Task".into(),
                }],
            }],
            issues: vec![],
        }));
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "Task", "bob")).await;
        let ctx = LiveContext::new(backend.clone());

        let handled = handler
            .handle(&mail("alice@example.com", "Hello"), &ctx)
            .await
            .unwrap();
        assert!(!handled);
        assert_eq!(backend.mutation_count(), 0);
        assert_eq!(ctx.collector().errors(), vec!["Operating user 'admin' is inactive."]);
    }

    #[tokio::test]
    async fn create_mode_unknown_project_never_handles() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("NOPE", "Task", "bob")).await;

        for subject in ["First", "Second"] {
            let ctx = LiveContext::new(backend.clone());
            let handled = handler
                .handle(&mail("alice@example.com", subject), &ctx)
                .await
                .unwrap();
            assert!(!handled);
            assert_eq!(ctx.collector().errors(), vec!["Project 'NOPE' does not exist."]);
        }
        assert_eq!(backend.mutation_count(), 0);
        assert_eq!(backend.issues().await.len(), 1);
    }

    #[tokio::test]
    async fn create_mode_dry_run_leaves_backend_untouched() {
        let backend = tracker();
        let handler = ready(ModeKind::Create, backend.clone(), create_params("TEST", "Task", "bob")).await;
        let ctx = DryRunContext::new();

        assert!(handler.handle(&mail("alice@example.com", "Hello"), &ctx).await.unwrap());
        assert_eq!(backend.mutation_count(), 0);
        assert_eq!(ctx.actions().len(), 1);
        assert!(backend.logged_in_user().await.is_none());
    }
}
