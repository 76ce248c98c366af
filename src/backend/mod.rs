//! Issue-tracking backend — capability traits and an in-memory implementation.

pub mod memory;
pub mod traits;

pub use memory::{MemoryTracker, TrackerFixture};
pub use traits::{
    AuthContext, Comment, CreateValidationResult, Issue, IssueInput, IssueLookup, IssueService,
    IssueType, Project, ProjectLookup, User, UserDirectory,
};
