//! Mail handler core.
//!
//! Dependency order, leaves first:
//! 1. `actors`: sender and named-user resolution
//! 2. `locator`: issue / project / issue type existence checks
//! 3. `executor`: comment bodies, create requests, validate-then-commit
//! 4. `comment` / `create`: the two pipelines
//! 5. `mail_handler`: lifecycle and per-message orchestration
//!
//! `monitor` and `context` carry diagnostics and mutations through all of it.

pub mod actors;
pub mod comment;
pub mod context;
pub mod create;
pub mod details;
pub mod executor;
pub mod locator;
pub mod mail_handler;
pub mod monitor;

pub use actors::{ActorResolver, ReporterResolution};
pub use context::{DryRunAction, DryRunContext, HandlerContext, LiveContext, Mutation};
pub use details::HandlerDetails;
pub use mail_handler::{HandlerState, MailHandler, Pipeline};
pub use monitor::{Collector, Destination, ErrorCollector, MonitorEntry, Severity};
