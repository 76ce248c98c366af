//! Handler details as edited by an operator.
//!
//! Reads the current settings out of the stored params string, writes them
//! back, and validates a submission into the form's collector.

use super::locator::IssueKeyValidator;
use super::monitor::ErrorCollector;
use crate::config::{HandlerParams, KEY_ISSUE_KEY};
use crate::error::{BackendError, ConfigError};

/// Editable settings of a comment-mode handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerDetails {
    pub issue_key: Option<String>,
}

impl HandlerDetails {
    pub fn from_params(params: &HandlerParams) -> Self {
        Self {
            issue_key: params.get(KEY_ISSUE_KEY).map(str::to_string),
        }
    }

    /// Copy settings out of a stored params string.
    pub fn from_params_string(raw: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_params(&HandlerParams::parse_str(raw)?))
    }

    pub fn to_params(&self) -> HandlerParams {
        HandlerParams::from_map(
            self.issue_key
                .iter()
                .map(|key| (KEY_ISSUE_KEY, key.trim().to_string())),
        )
    }

    /// Validate the submission. `Ok(true)` when it may be saved.
    pub async fn validate(
        &self,
        validator: &IssueKeyValidator,
        collector: &dyn ErrorCollector,
    ) -> Result<bool, BackendError> {
        let Some(key) = self.issue_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
        else {
            collector.error(&format!(
                "Issue key has not been specified ('{KEY_ISSUE_KEY}' parameter)."
            ));
            return Ok(false);
        };
        Ok(validator.validate_issue(key, collector).await?.is_some())
    }
}
