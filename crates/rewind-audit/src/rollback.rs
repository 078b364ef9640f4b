//! Rolls the cluster and the repository back to a historical commit.
//!
//! The file-level diff from HEAD to the target drives two cluster phases
//! split around the repository reset:
//!
//! 1. Resources missing from the target are deleted from the cluster. Their
//!    metadata is read from the working tree before the reset removes it.
//! 2. The working tree is hard reset to the target, then HEAD is soft reset
//!    back so the next commit records the whole delta on top of history.
//! 3. Resources present in the target are created or updated from the reset
//!    working tree.
//! 4. The result is committed as `Rollback to commit <hash>`.

use crate::repo::{RepoInner, RepoState, ROLLBACK_AUTHOR, SYSTEM_EMAIL};
use crate::resource::{Resource, ResourceKind};
use crate::tagging::resolve_commit;
use crate::{AuditError, Result};
use rewind_storage::{Commit, FilePatch, ObjectId, Repository, Signature};

fn read_resource(store: &Repository, path: &str) -> Result<(ResourceKind, Resource)> {
    let data = store.read_file(path)?;
    Resource::from_yaml(&data)
}

impl RepoState {
    /// Rolls back to `target` and returns the rollback commit.
    ///
    /// Holds the repository lock throughout. On failure the rollback flag
    /// stays set and audit batches are refused until [`RepoState::recover`].
    pub async fn rollback(&self, target: &Commit) -> Result<ObjectId> {
        let mut inner = self.lock().await;
        if inner.rollback_in_progress {
            return Err(AuditError::RollbackInProgress);
        }
        tracing::info!(
            to = %target.id,
            "Rollback initiated, ignoring all non-rollback audits"
        );
        inner.rollback_in_progress = true;

        match self.run_rollback(&inner, target).await {
            Ok(commit) => {
                inner.rollback_in_progress = false;
                tracing::info!(to = %target.id, commit = %commit, "Rollback successful");
                Ok(commit)
            }
            Err(e) => {
                tracing::error!(
                    to = %target.id,
                    error = %e,
                    "Rollback failed, repository needs recovery"
                );
                Err(e)
            }
        }
    }

    /// Rolls back to the commit a tag points at.
    pub async fn rollback_to_tag(&self, tag: &str) -> Result<ObjectId> {
        let target = self.tag_to_commit(tag).await?;
        self.rollback(&target).await
    }

    /// Rolls back to the commit with the given hash.
    pub async fn rollback_to_hash(&self, sha: &str) -> Result<ObjectId> {
        let target = self.hash_to_commit(sha).await?;
        self.rollback(&target).await
    }

    /// Discards uncommitted work tree changes left by a failed rollback and
    /// clears the rollback flag.
    ///
    /// Cluster state is not touched.
    pub async fn recover(&self) -> Result<ObjectId> {
        let mut inner = self.lock().await;
        let head = inner.store.head()?;
        inner.store.reset_hard(&head)?;
        inner.rollback_in_progress = false;
        tracing::warn!(head = %head, "Recovered from failed rollback");
        Ok(head)
    }

    async fn run_rollback(&self, inner: &RepoInner, target: &Commit) -> Result<ObjectId> {
        let store = &inner.store;
        let target = resolve_commit(store, &target.id.to_hex())?;
        let head = store.head()?;
        let patches = store.diff(&head, &target.id)?;

        self.delete_phase(store, &patches).await?;

        store.reset_hard(&target.id)?;
        store.reset_soft(&head)?;

        self.apply_phase(store, &patches).await?;

        let author = Signature::now(ROLLBACK_AUTHOR, SYSTEM_EMAIL);
        Ok(store.commit(&author, &format!("Rollback to commit {}", target.id))?)
    }

    async fn delete_phase(&self, store: &Repository, patches: &[FilePatch]) -> Result<()> {
        for patch in patches.iter().filter(|p| p.to.is_none()) {
            let (kind, resource) = read_resource(store, &patch.path)?;
            self.cluster().delete_resource(kind, &resource).await?;
            tracing::debug!(path = %patch.path, "Rollback deleted resource");
        }
        Ok(())
    }

    async fn apply_phase(&self, store: &Repository, patches: &[FilePatch]) -> Result<()> {
        for patch in patches.iter().filter(|p| p.to.is_some()) {
            let (kind, resource) = read_resource(store, &patch.path)?;
            self.cluster().create_or_update(kind, &resource).await?;
            tracing::debug!(path = %patch.path, kind = %patch.kind, "Rollback applied resource");
        }
        Ok(())
    }
}
