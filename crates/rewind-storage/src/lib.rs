//! # Rewind Storage
//!
//! Git-compatible versioned file store for audited cluster resources.
//!
//! This crate provides:
//! - SHA-1 content-addressed blob, tree, commit and tag objects
//! - Loose-object storage on disk (`.git/objects`) or in memory
//! - Reference management (HEAD, `refs/heads/main`, `refs/tags/*`)
//! - A `.git/index` kept in step with the staged snapshot
//! - A working tree with staging, commits, resets and diffs
//! - History walks filtered by time window and path
//!
//! ## Example
//!
//! ```rust
//! use rewind_storage::{Repository, Signature};
//!
//! let repo = Repository::in_memory();
//! repo.write_file("antrea-tiers/gold.yaml", b"kind: Tier\n").unwrap();
//! let id = repo
//!     .commit(&Signature::now("alice", "alice@example.com"), "Created tier gold")
//!     .unwrap();
//! assert_eq!(repo.head().unwrap(), id);
//! ```

pub mod diff;
mod error;
pub mod index;
mod log;
mod object;
mod refs;
mod repository;
mod signature;
pub mod store;
mod traits;
pub mod tree;
pub mod worktree;

pub use diff::{diff_files, ChangeKind, FilePatch};
pub use error::StorageError;
pub use log::{LogOptions, PathPredicate};
pub use object::{Commit, GitObject, ObjectId, ObjectType, TagObject};
pub use refs::{validate_ref_name, RefStore, Reference};
pub use repository::{Repository, StorageMode, DEFAULT_BRANCH};
pub use signature::Signature;
pub use store::{LooseObjectStore, ObjectStore};
pub use traits::ObjectStoreBackend;
pub use tree::FileMap;
pub use worktree::WorkTree;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
