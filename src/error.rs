//! Error types for the mail handler.
//!
//! Only transport-level failures surface as errors. Everything a caller can
//! recover from (unknown sender, missing issue, rejected create) is reported
//! to a collector and turns into `Ok(false)` from `MailHandler::handle`.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the issue-tracking backend.
///
/// "Not found" is never an error here: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend request {operation} failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Permission denied for {user}: {reason}")]
    PermissionDenied { user: String, reason: String },

    #[error("Failed to load backend fixture: {0}")]
    Fixture(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or unreadable inbound mail.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message could not be parsed as RFC 822")]
    Unparseable,

    #[error("Message has no usable {0} header")]
    MissingHeader(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by `MailHandler::handle`.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler is not ready: {0}")]
    NotReady(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
