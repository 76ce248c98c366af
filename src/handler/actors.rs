//! Actor resolution — maps senders and configured names to backend users.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{User, UserDirectory};
use crate::error::BackendError;
use crate::mail::IncomingMessage;

/// Who ends up as the reporter of a new issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterResolution {
    /// The message sender maps to a user.
    Sender(User),
    /// The sender is unknown; the configured default reporter is used.
    Fallback(User),
    /// Neither resolves. No mutation may be attempted.
    Unresolved,
}

impl ReporterResolution {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Sender(user) | Self::Fallback(user) => Some(user),
            Self::Unresolved => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sender(_) => "sender",
            Self::Fallback(_) => "fallback",
            Self::Unresolved => "unresolved",
        }
    }
}

/// Resolves message senders and named identities against the user directory.
#[derive(Clone)]
pub struct ActorResolver {
    users: Arc<dyn UserDirectory>,
}

impl ActorResolver {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Exact lookup of the first sender address. No fuzzy matching.
    pub async fn resolve_sender(
        &self,
        message: &IncomingMessage,
    ) -> Result<Option<User>, BackendError> {
        let Some(sender) = message.sender() else {
            debug!("Message has no sender address");
            return Ok(None);
        };
        let user = self.users.user_by_email(&sender.address).await?;
        debug!(
            sender = %sender.address,
            resolved = user.is_some(),
            "Resolved message sender"
        );
        Ok(user)
    }

    pub async fn resolve_named(&self, name: &str) -> Result<Option<User>, BackendError> {
        self.users.user_by_name(name).await
    }

    /// The identity that authorizes create-mode mutations.
    pub async fn resolve_operator(&self, name: &str) -> Result<Option<User>, BackendError> {
        let operator = self.users.user_by_name(name).await?;
        if let Some(ref user) = operator {
            info!(
                operator = %user.name,
                email = %user.email,
                "Incoming mail: using operating user"
            );
        }
        Ok(operator)
    }

    /// Sender if known, else the named default reporter, else `Unresolved`.
    pub async fn resolve_reporter(
        &self,
        message: &IncomingMessage,
        default_name: &str,
    ) -> Result<ReporterResolution, BackendError> {
        if let Some(user) = self.resolve_sender(message).await? {
            return Ok(ReporterResolution::Sender(user));
        }
        match self.resolve_named(default_name).await? {
            Some(user) => Ok(ReporterResolution::Fallback(user)),
            None => Ok(ReporterResolution::Unresolved),
        }
    }
}
