//! Configuration types.
//!
//! Two layers: `HandlerParams` (the handler's own string/string settings,
//! validated into a `HandlerMode`) and `ServiceConfig` (how the binary finds
//! its params, backend fixture and forward address, read from the env).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::handler::monitor::ErrorCollector;

pub const KEY_ISSUE_KEY: &str = "issueKey";
pub const KEY_PROJECT_KEY: &str = "projectKey";
pub const KEY_ISSUE_TYPE_NAME: &str = "issueTypeName";
pub const KEY_REPORTER_DEFAULT_NAME: &str = "reporterDefaultName";
pub const KEY_RUN_AS_USER: &str = "runAsUser";
pub const KEY_NOTIFY_USERS: &str = "notifyUsers";

/// Operating identity used for create-mode mutations when `runAsUser` is unset.
pub const DEFAULT_RUN_AS_USER: &str = "admin";

static ISSUE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-[0-9]+$").unwrap());

/// Whether `key` looks like `PROJ-123`.
pub fn is_valid_issue_key(key: &str) -> bool {
    ISSUE_KEY_RE.is_match(key)
}

// ── Handler parameters ──────────────────────────────────────────────

/// Immutable string/string handler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerParams {
    values: BTreeMap<String, String>,
}

impl HandlerParams {
    pub fn from_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse the stored `key=value, key2=value2` form.
    ///
    /// Keys and values are trimmed, empty segments skipped, later duplicates
    /// win. A segment without `=` or with an empty key is rejected.
    pub fn parse_str(raw: &str) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();
        for segment in raw.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((key, value)) = segment.split_once('=') else {
                return Err(ConfigError::ParseError(format!(
                    "handler parameter '{segment}' is not of the form key=value"
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::ParseError(format!(
                    "handler parameter '{segment}' has an empty key"
                )));
            }
            values.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    /// Render back to the stored form, keys sorted.
    pub fn to_params_string(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The value for `key` when present and not blank, trimmed.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ── Mode ────────────────────────────────────────────────────────────

/// Which pipeline a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Comment,
    Create,
}

impl ModeKind {
    /// `issueKey` present selects comment mode; anything else is create mode.
    pub fn infer(params: &HandlerParams) -> Self {
        if params.contains(KEY_ISSUE_KEY) {
            Self::Comment
        } else {
            Self::Create
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Create => "create",
        }
    }
}

impl FromStr for ModeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comment" => Ok(Self::Comment),
            "create" => Ok(Self::Create),
            other => Err(ConfigError::InvalidValue {
                key: "mode".into(),
                message: format!("unknown handler mode '{other}'"),
            }),
        }
    }
}

/// Validated handler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerMode {
    /// Append every message to one existing issue.
    Comment { issue_key: String, notify: bool },
    /// Create one issue per message.
    Create {
        project_key: String,
        issue_type_name: String,
        default_reporter: String,
        run_as: String,
    },
}

impl HandlerMode {
    /// Read and validate the keys `kind` requires.
    ///
    /// Every problem is reported to `collector`, not just the first; returns
    /// `None` when any required key is missing or invalid.
    pub fn from_params(
        kind: ModeKind,
        params: &HandlerParams,
        collector: &dyn ErrorCollector,
    ) -> Option<Self> {
        match kind {
            ModeKind::Comment => {
                let issue_key = required(params, KEY_ISSUE_KEY, "Issue key", collector);
                let notify = optional_flag(params, KEY_NOTIFY_USERS, collector);
                let issue_key = issue_key?;
                if !is_valid_issue_key(issue_key) {
                    collector.error(&format!(
                        "'{issue_key}' is not a valid issue key ('{KEY_ISSUE_KEY}' parameter)."
                    ));
                    return None;
                }
                Some(Self::Comment {
                    issue_key: issue_key.to_string(),
                    notify: notify?,
                })
            }
            ModeKind::Create => {
                let project_key = required(params, KEY_PROJECT_KEY, "Project key", collector);
                let issue_type_name =
                    required(params, KEY_ISSUE_TYPE_NAME, "Issue type name", collector);
                let default_reporter = required(
                    params,
                    KEY_REPORTER_DEFAULT_NAME,
                    "Default reporter name",
                    collector,
                );
                let run_as = params
                    .non_blank(KEY_RUN_AS_USER)
                    .unwrap_or(DEFAULT_RUN_AS_USER);
                Some(Self::Create {
                    project_key: project_key?.to_string(),
                    issue_type_name: issue_type_name?.to_string(),
                    default_reporter: default_reporter?.to_string(),
                    run_as: run_as.to_string(),
                })
            }
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Comment { .. } => ModeKind::Comment,
            Self::Create { .. } => ModeKind::Create,
        }
    }
}

fn required<'a>(
    params: &'a HandlerParams,
    key: &str,
    label: &str,
    collector: &dyn ErrorCollector,
) -> Option<&'a str> {
    let value = params.non_blank(key);
    if value.is_none() {
        collector.error(&format!(
            "{label} has not been specified ('{key}' parameter). This handler will not work correctly."
        ));
    }
    value
}

fn optional_flag(
    params: &HandlerParams,
    key: &str,
    collector: &dyn ErrorCollector,
) -> Option<bool> {
    match params.non_blank(key).map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") => Some(false),
        Some("true") => Some(true),
        Some(other) => {
            collector.error(&format!(
                "'{other}' is not a valid value for '{key}' (expected true or false)."
            ));
            None
        }
    }
}

// ── Service configuration ───────────────────────────────────────────

/// Configuration for the `mail-ticket` binary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Handler parameters.
    pub params: HandlerParams,
    /// Explicit mode; inferred from `params` when unset.
    pub mode: Option<ModeKind>,
    /// JSON fixture for the in-memory tracker.
    pub backend_fixture: PathBuf,
    /// Where unhandled messages go; left in place when unset.
    pub forward_address: Option<String>,
    /// Route mutations through the dry-run context.
    pub dry_run: bool,
}

impl ServiceConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_params = std::env::var("MAIL_TICKET_PARAMS")
            .map_err(|_| ConfigError::MissingEnvVar("MAIL_TICKET_PARAMS".into()))?;
        let params = HandlerParams::parse_str(&raw_params)?;

        let mode = std::env::var("MAIL_TICKET_MODE")
            .ok()
            .map(|s| s.parse::<ModeKind>())
            .transpose()?;

        let backend_fixture = std::env::var("MAIL_TICKET_BACKEND")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingRequired {
                key: "MAIL_TICKET_BACKEND".into(),
                hint: "Point it at a JSON tracker fixture.".into(),
            })?;

        let forward_address = std::env::var("MAIL_TICKET_FORWARD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let dry_run = std::env::var("MAIL_TICKET_DRY_RUN")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            params,
            mode,
            backend_fixture,
            forward_address,
            dry_run,
        })
    }

    /// The mode to run: explicit, else inferred from the params.
    pub fn mode_kind(&self) -> ModeKind {
        self.mode.unwrap_or_else(|| ModeKind::infer(&self.params))
    }
}
