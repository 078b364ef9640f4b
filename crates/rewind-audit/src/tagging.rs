//! Named pointers to known-good commits.

use crate::repo::RepoState;
use crate::{AuditError, Result};
use rewind_storage::{Commit, ObjectId, Repository, Signature, StorageError};

/// Resolves a hex commit hash against the store.
pub(crate) fn resolve_commit(store: &Repository, sha: &str) -> Result<Commit> {
    let id = ObjectId::from_hex(sha.trim()).map_err(|_| AuditError::CommitNotFound(sha.into()))?;
    match store.commit_at(&id) {
        Ok(commit) => Ok(commit),
        Err(StorageError::ObjectNotFound(_) | StorageError::InvalidObject(_)) => {
            Err(AuditError::CommitNotFound(sha.into()))
        }
        Err(e) => Err(e.into()),
    }
}

impl RepoState {
    /// Tags a commit. An existing tag with the same name is never moved.
    pub async fn tag_commit(&self, sha: &str, tag: &str, tagger: &Signature) -> Result<ObjectId> {
        let inner = self.lock().await;
        let commit = resolve_commit(&inner.store, sha)?;
        match inner.store.create_tag(tag, &commit.id, tagger, tag) {
            Ok(_) => {}
            Err(StorageError::TagExists(name)) => return Err(AuditError::TagExists(name)),
            Err(StorageError::InvalidRef(why)) => return Err(AuditError::InvalidName(why)),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(tag = %tag, commit = %commit.id, "Tag created");
        Ok(commit.id)
    }

    /// Deletes a tag.
    pub async fn remove_tag(&self, tag: &str) -> Result<()> {
        let inner = self.lock().await;
        match inner.store.delete_tag(tag) {
            Ok(()) => {
                tracing::info!(tag = %tag, "Tag deleted");
                Ok(())
            }
            Err(StorageError::RefNotFound(_)) => Err(AuditError::TagNotFound(tag.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit a tag points at.
    pub async fn tag_to_commit(&self, tag: &str) -> Result<Commit> {
        let inner = self.lock().await;
        let id = match inner.store.tag_target(tag) {
            Ok(id) => id,
            Err(StorageError::RefNotFound(_)) => return Err(AuditError::TagNotFound(tag.into())),
            Err(e) => return Err(e.into()),
        };
        Ok(inner.store.commit_at(&id)?)
    }

    /// Commit with the given hash.
    pub async fn hash_to_commit(&self, sha: &str) -> Result<Commit> {
        let inner = self.lock().await;
        resolve_commit(&inner.store, sha)
    }

    /// All tags with their commits, sorted by name.
    pub async fn list_tags(&self) -> Result<Vec<(String, ObjectId)>> {
        Ok(self.lock().await.store.list_tags()?)
    }
}
