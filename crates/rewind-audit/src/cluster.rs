//! Interface to the live cluster, and an in-memory implementation.

use crate::error::ClusterError;
use crate::layout::ResourceDescriptor;
use crate::resource::{Resource, ResourceKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result type for cluster calls.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Operations the rollback engine and repository seeding need from a cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists every resource of a kind across all namespaces.
    async fn list_resources(&self, kind: ResourceKind) -> ClusterResult<Vec<Resource>>;

    /// Fetches one resource.
    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Resource>;

    /// Creates a resource, replacing it at its current version if it exists.
    async fn create_or_update(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()>;

    /// Deletes a resource.
    async fn delete_resource(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()>;
}

/// A cluster held in memory, for tests and offline runs.
///
/// Stored resources get a monotonically increasing `resourceVersion`.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    resources: RwLock<BTreeMap<ResourceDescriptor, Resource>>,
    version: RwLock<u64>,
    unavailable: AtomicBool,
}

impl MemoryCluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource directly, bypassing availability checks.
    pub fn insert(&self, kind: ResourceKind, resource: Resource) {
        let descriptor = ResourceDescriptor::of(kind, &resource);
        let resource = self.stamp(resource);
        self.resources.write().insert(descriptor, resource);
    }

    /// Returns a copy of every stored resource.
    pub fn snapshot(&self) -> BTreeMap<ResourceDescriptor, Resource> {
        self.resources.read().clone()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Makes every subsequent call fail until re-enabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> ClusterResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("memory cluster disabled".into()));
        }
        Ok(())
    }

    fn stamp(&self, mut resource: Resource) -> Resource {
        let mut version = self.version.write();
        *version += 1;
        resource.metadata.resource_version = Some(version.to_string());
        resource
    }

    fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind: kind.kind().to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn list_resources(&self, kind: ResourceKind) -> ClusterResult<Vec<Resource>> {
        self.check()?;
        Ok(self
            .resources
            .read()
            .iter()
            .filter(|(descriptor, _)| descriptor.kind == kind)
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Resource> {
        self.check()?;
        self.resources
            .read()
            .get(&ResourceDescriptor::new(kind, namespace, name))
            .cloned()
            .ok_or_else(|| Self::not_found(kind, namespace, name))
    }

    async fn create_or_update(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()> {
        self.check()?;
        if resource.name().is_empty() {
            return Err(ClusterError::InvalidResource("resource has no name".into()));
        }
        self.insert(kind, resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()> {
        self.check()?;
        let descriptor = ResourceDescriptor::of(kind, resource);
        self.resources
            .write()
            .remove(&descriptor)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(kind, resource.namespace(), resource.name()))
    }
}
