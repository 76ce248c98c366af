//! Batch pipeline around the mail handler.
//!
//! Raw mail flows through:
//! 1. `IncomingMessage::parse()`: subject, body, senders
//! 2. `MailHandler::handle()`: comment or create, live or dry run
//! 3. `Disposition`: delete, forward, leave or failed
//!
//! The transport that fetched the mail applies the disposition.

pub mod processor;
pub mod types;

pub use processor::MailProcessor;
pub use types::{Disposition, ProcessedMessage, RawMail};
