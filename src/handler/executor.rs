//! Mutation execution — comment bodies, create requests and the two-phase
//! validate/commit.

use std::sync::Arc;

use tracing::{info, warn};

use super::context::{HandlerContext, Mutation};
use super::locator::CreateTarget;
use crate::backend::memory::MAX_SUMMARY_CHARS;
use crate::backend::{AuthContext, Issue, IssueInput, IssueService, User};
use crate::error::BackendError;
use crate::mail::{IncomingMessage, abbreviate};

/// Longest body carried into a comment; longer bodies are abbreviated.
pub const MAX_COMMENT_BODY_CHARS: usize = 100_000;

/// Summary used for messages without a subject.
pub const NO_SUBJECT_SUMMARY: &str = "(no subject)";

/// Subject, then a newline and the abbreviated body when there is one.
pub fn build_comment_body(subject: Option<&str>, body: Option<&str>) -> String {
    let mut comment = String::from(subject.unwrap_or_default());
    if let Some(body) = body {
        comment.push('\n');
        comment.push_str(&abbreviate(body, MAX_COMMENT_BODY_CHARS));
    }
    comment
}

/// Compose the create request for `message`.
pub fn build_issue_input(
    message: &IncomingMessage,
    reporter: &User,
    target: &CreateTarget,
) -> IssueInput {
    let summary = message
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT_SUMMARY);

    IssueInput::new()
        .with_summary(abbreviate(summary, MAX_SUMMARY_CHARS))
        .with_description(message.body.clone())
        .with_reporter(reporter.name.clone())
        .with_project_id(target.project.id)
        .with_issue_type_id(target.issue_type.id.clone())
}

/// Append `text` to `issue` through the context. Transport errors propagate.
pub async fn post_comment(
    context: &dyn HandlerContext,
    issue: &Issue,
    author: &User,
    text: &str,
    notify: bool,
) -> Result<Mutation, BackendError> {
    let mutation = context.create_comment(issue, author, text, notify).await?;
    info!(
        issue_key = %issue.key,
        author = %author.name,
        chars = text.chars().count(),
        outcome = mutation.label(),
        "Comment from mail dispatched"
    );
    Ok(mutation)
}

/// Two-phase create: validate, then commit only a clean result.
#[derive(Clone)]
pub struct MutationExecutor {
    service: Arc<dyn IssueService>,
    auth: Arc<dyn AuthContext>,
}

impl MutationExecutor {
    pub fn new(service: Arc<dyn IssueService>, auth: Arc<dyn AuthContext>) -> Self {
        Self { service, auth }
    }

    /// Returns `Ok(None)` when validation reports errors; every error and
    /// warning has then been written to the context's monitor.
    ///
    /// The backend session is switched to `operator` on real runs only.
    pub async fn create_issue(
        &self,
        context: &dyn HandlerContext,
        operator: &User,
        input: IssueInput,
    ) -> Result<Option<Mutation>, BackendError> {
        if context.is_real_run() {
            self.auth.set_logged_in_user(operator).await?;
        }
        let validated = self.service.validate_create(operator, input).await?;

        if !validated.is_valid() {
            warn!(
                errors = validated.errors.len(),
                warnings = validated.warnings.len(),
                "Create validation failed"
            );
            let monitor = context.monitor();
            for error in &validated.errors {
                monitor.error(error);
            }
            for warning in &validated.warnings {
                monitor.warning(warning);
            }
            return Ok(None);
        }

        for warning in &validated.warnings {
            context.monitor().warning(warning);
        }

        let summary = validated.input.summary.clone();
        let mutation = context.create_issue(operator, validated).await?;
        info!(
            summary = %summary,
            operator = %operator.name,
            outcome = mutation.label(),
            "Issue from mail dispatched"
        );
        Ok(Some(mutation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IssueType, MemoryTracker, Project, TrackerFixture};
    use crate::handler::context::{DryRunContext, LiveContext};
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

    fn target() -> CreateTarget {
        CreateTarget {
            project: Project {
                id: 10000,
                key: "TEST".into(),
                name: "Test".into(),
                issue_types: vec![IssueType {
                    id: "3".into(),
                    name: "Task".into(),
                }],
            },
            issue_type: IssueType {
                id: "3".into(),
                name: "Task".into(),
            },
        }
    }

    fn tracker() -> Arc<MemoryTracker> {
        Arc::new(MemoryTracker::new(TrackerFixture {
            users: vec![user("admin"), user("alice")],
            projects: vec![target().project],
            issues: vec![],
        }))
    }

    #[test]
    fn comment_body_subject_and_body() {
        assert_eq!(
            build_comment_body(Some("Help"), Some("It broke")),
            "Help\nIt broke"
        );
    }

    #[test]
    fn comment_body_without_body_is_subject_only() {
        assert_eq!(build_comment_body(Some("Help"), None), "Help");
        assert_eq!(build_comment_body(None, None), "");
    }

    #[test]
    fn comment_body_truncates_long_bodies() {
        let body = "x".repeat(MAX_COMMENT_BODY_CHARS + 50);
        let comment = build_comment_body(Some("Big"), Some(&body));
        let (subject, rest) = comment.split_once('\n').unwrap();
        assert_eq!(subject, "Big");
        assert_eq!(rest.chars().count(), MAX_COMMENT_BODY_CHARS);
        assert!(rest.ends_with("..."));
    }

    #[test]
    fn comment_body_at_limit_unchanged() {
        let body = "y".repeat(MAX_COMMENT_BODY_CHARS);
        let comment = build_comment_body(Some("Edge"), Some(&body));
        assert_eq!(comment, format!("Edge\n{body}"));
    }

    #[test]
    fn issue_input_from_message() {
        let message = IncomingMessage::new()
            .with_subject("  Printer on fire ")
            .with_body("Smoke")
            .with_sender(MailAddress::new("alice@example.com"));
        let input = build_issue_input(&message, &user("alice"), &target());
        assert_eq!(input.summary, "Printer on fire");
        assert_eq!(input.description.as_deref(), Some("Smoke"));
        assert_eq!(input.reporter, "alice");
        assert_eq!(input.project_id, 10000);
        assert_eq!(input.issue_type_id, "3");
    }

    #[test]
    fn issue_input_without_subject_uses_placeholder() {
        let input = build_issue_input(&IncomingMessage::new(), &user("alice"), &target());
        assert_eq!(input.summary, NO_SUBJECT_SUMMARY);
    }

    #[test]
    fn issue_input_summary_is_capped() {
        let message = IncomingMessage::new().with_subject("s".repeat(400));
        let input = build_issue_input(&message, &user("alice"), &target());
        assert_eq!(input.summary.chars().count(), MAX_SUMMARY_CHARS);
    }

    #[tokio::test]
    async fn create_sets_operator_session_and_commits() {
        let tracker = tracker();
        let executor = MutationExecutor::new(tracker.clone(), tracker.clone());
        let ctx = LiveContext::new(tracker.clone());
        let input = build_issue_input(
            &IncomingMessage::new().with_subject("Hi").with_body("Body"),
            &user("alice"),
            &target(),
        );

        let mutation = executor
            .create_issue(&ctx, &user("admin"), input)
            .await
            .unwrap();
        assert!(matches!(mutation, Some(Mutation::Created(ref i)) if i.key == "TEST-1"));
        assert_eq!(tracker.logged_in_user().await.map(|u| u.name), Some("admin".into()));
    }

    #[tokio::test]
    async fn create_with_errors_is_not_committed() {
        let tracker = tracker();
        let executor = MutationExecutor::new(tracker.clone(), tracker.clone());
        let ctx = LiveContext::new(tracker.clone());
        let input = build_issue_input(&IncomingMessage::new(), &user("ghost"), &target());

        let mutation = executor
            .create_issue(&ctx, &user("admin"), input)
            .await
            .unwrap();
        assert!(mutation.is_none());
        assert_eq!(tracker.mutation_count(), 0);
        assert_eq!(
            ctx.collector().errors(),
            vec!["The reporter specified is not a user."]
        );
        assert_eq!(ctx.collector().warnings(), vec!["Issue has no description."]);
    }

    #[tokio::test]
    async fn create_in_dry_run_validates_but_does_not_commit() {
        let tracker = tracker();
        let executor = MutationExecutor::new(tracker.clone(), tracker.clone());
        let ctx = DryRunContext::new();
        let input = build_issue_input(
            &IncomingMessage::new().with_subject("Hi").with_body("Body"),
            &user("alice"),
            &target(),
        );

        let mutation = executor
            .create_issue(&ctx, &user("admin"), input)
            .await
            .unwrap();
        assert!(matches!(mutation, Some(Mutation::Simulated(_))));
        assert_eq!(tracker.mutation_count(), 0);
        assert_eq!(ctx.actions().len(), 1);
        assert!(tracker.logged_in_user().await.is_none());
    }
}
