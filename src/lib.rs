//! mail-ticket — turns inbound mail into issue comments or new issues.

pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod mail;
pub mod pipeline;
