//! Comment-mode pipeline: append each message to one configured issue.

use std::sync::Arc;

use tracing::{info, warn};

use super::actors::ActorResolver;
use super::context::HandlerContext;
use super::executor::{build_comment_body, post_comment};
use super::locator::IssueKeyValidator;
use super::monitor::ErrorCollector;
use crate::backend::{IssueLookup, UserDirectory};
use crate::error::BackendError;
use crate::mail::IncomingMessage;

pub struct CommentPipeline {
    validator: IssueKeyValidator,
    actors: ActorResolver,
}

impl CommentPipeline {
    pub fn new(issues: Arc<dyn IssueLookup>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            validator: IssueKeyValidator::new(issues),
            actors: ActorResolver::new(users),
        }
    }

    pub fn validator(&self) -> &IssueKeyValidator {
        &self.validator
    }

    /// Configuration-time existence check.
    pub async fn check(
        &self,
        issue_key: &str,
        collector: &dyn ErrorCollector,
    ) -> Result<(), BackendError> {
        self.validator.validate_issue(issue_key, collector).await?;
        Ok(())
    }

    /// `Ok(true)` once the comment has been dispatched.
    pub async fn handle(
        &self,
        issue_key: &str,
        notify: bool,
        message: &IncomingMessage,
        context: &dyn HandlerContext,
    ) -> Result<bool, BackendError> {
        let monitor = context.monitor();

        // The issue may have been deleted or moved since configuration.
        let Some(issue) = self.validator.validate_issue(issue_key, monitor).await? else {
            warn!(issue_key, "Configured issue not found, message not handled");
            return Ok(false);
        };

        let Some(author) = self.actors.resolve_sender(message).await? else {
            let senders = message.sender_list();
            warn!(senders = %senders, "Unknown sender, message not handled");
            monitor.error(&format!(
                "Message sender(s) '{senders}' do not have corresponding users. Message will be ignored."
            ));
            return Ok(false);
        };
        info!(author = %author.name, "Incoming mail: using comment author");

        let text = build_comment_body(message.subject.as_deref(), message.body.as_deref());
        post_comment(context, &issue, &author, &text, notify).await?;
        Ok(true)
    }
}
