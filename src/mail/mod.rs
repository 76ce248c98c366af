//! Inbound mail: message model, RFC 822 extraction and body helpers.

pub mod body;
pub mod message;

pub use body::abbreviate;
pub use message::{IncomingMessage, MailAddress};
