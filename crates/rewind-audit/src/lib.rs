//! # Rewind Audit
//!
//! Records every change to audited network-policy resources as a commit and
//! rolls the cluster back to any recorded state.
//!
//! - [`RepoState`] owns the versioned store behind one lock.
//! - [`RepoState::handle_event_list`] turns audit events into commits.
//! - [`RepoState::filter_commits`] queries history.
//! - [`RepoState::tag_commit`] and friends manage tags.
//! - [`RepoState::rollback`] reconciles the cluster with a past commit.
//!
//! The live cluster is reached through the [`ClusterClient`] trait;
//! [`MemoryCluster`] implements it in memory.

mod cluster;
mod error;
pub mod event;
mod filter;
mod layout;
mod processor;
mod repo;
mod resource;
mod rollback;
mod tagging;

pub use cluster::{ClusterClient, ClusterResult, MemoryCluster};
pub use error::{AuditError, ClusterError};
pub use filter::CommitQuery;
pub use layout::{PathFilter, ResourceDescriptor};
pub use processor::BatchOutcome;
pub use repo::{
    service_account_user, RepoConfig, RepoState, DEFAULT_SERVICE_ACCOUNT_NAME, INIT_AUTHOR,
    INIT_MESSAGE, ROLLBACK_AUTHOR, SYSTEM_EMAIL,
};
pub use resource::{Resource, ResourceKind, LAST_APPLIED_ANNOTATION};

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
