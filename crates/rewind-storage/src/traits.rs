//! Storage backend traits.
//!
//! Defines the interface that object backends implement, so the versioned
//! store can run against loose files on disk or an in-memory map.

use crate::{GitObject, ObjectId, Result, StorageError};
use std::sync::Arc;

/// Trait for object storage backends.
///
/// Implementations include the in-memory [`ObjectStore`](crate::ObjectStore)
/// and the on-disk [`LooseObjectStore`](crate::LooseObjectStore).
pub trait ObjectStoreBackend: Send + Sync {
    /// Stores an object and returns its ID.
    fn put(&self, object: GitObject) -> Result<ObjectId>;

    /// Retrieves an object by ID.
    fn get(&self, id: &ObjectId) -> Result<Option<GitObject>>;

    /// Checks if an object exists.
    fn contains(&self, id: &ObjectId) -> Result<bool>;

    /// Retrieves an object, failing if it is absent.
    fn read(&self, id: &ObjectId) -> Result<GitObject> {
        self.get(id)?
            .ok_or_else(|| StorageError::ObjectNotFound(id.to_hex()))
    }
}

impl<T: ObjectStoreBackend + ?Sized> ObjectStoreBackend for Arc<T> {
    fn put(&self, object: GitObject) -> Result<ObjectId> {
        (**self).put(object)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<GitObject>> {
        (**self).get(id)
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        (**self).contains(id)
    }
}

impl<T: ObjectStoreBackend + ?Sized> ObjectStoreBackend for Box<T> {
    fn put(&self, object: GitObject) -> Result<ObjectId> {
        (**self).put(object)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<GitObject>> {
        (**self).get(id)
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        (**self).contains(id)
    }
}
