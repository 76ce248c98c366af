//! Inbound mail model and RFC 822 extraction.
//!
//! Only subject, body, sender addresses, Message-ID and Date are extracted;
//! everything else in the MIME tree is ignored.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};

use super::body::strip_html;
use crate::error::MessageError;

/// A structured email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl std::fmt::Display for MailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// A message handed to the handler by the mail transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Plain-text body, unbounded.
    #[serde(default)]
    pub body: Option<String>,
    /// Sender addresses in header order.
    #[serde(default)]
    pub from: Vec<MailAddress>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_sender(mut self, address: MailAddress) -> Self {
        self.from.push(address);
        self
    }

    /// The sender consulted for actor resolution: the first `From` address.
    pub fn sender(&self) -> Option<&MailAddress> {
        self.from.first()
    }

    /// All sender addresses joined with `,` for operator messages.
    pub fn sender_list(&self) -> String {
        self.from
            .iter()
            .map(|a| a.address.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Extract a message from raw RFC 822 bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, MessageError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or(MessageError::Unparseable)?;

        let from = extract_addresses(parsed.from());
        if from.is_empty() {
            return Err(MessageError::MissingHeader("From"));
        }

        Ok(Self {
            message_id: parsed.message_id().map(str::to_string),
            subject: parsed.subject().map(str::to_string),
            body: extract_text(&parsed),
            from,
            received_at: parsed.date().and_then(to_utc),
        })
    }
}

/// Collect every address of a `mail_parser` address field, groups flattened.
fn extract_addresses(addr: Option<&mail_parser::Address>) -> Vec<MailAddress> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    let to_mail_address = |a: &mail_parser::Addr| {
        a.address.as_ref().map(|address| MailAddress {
            address: address.to_string(),
            name: a.name.as_ref().map(|n| n.to_string()),
        })
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs.iter().filter_map(to_mail_address).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(to_mail_address))
            .collect(),
    }
}

/// Readable text body: the text part, else the HTML part stripped of tags.
fn extract_text(parsed: &mail_parser::Message) -> Option<String> {
    if let Some(text) = parsed.body_text(0) {
        return Some(text.to_string());
    }
    parsed.body_html(0).map(|html| strip_html(html.as_ref()))
}

fn to_utc(d: &mail_parser::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(d.to_timestamp(), 0)
}
