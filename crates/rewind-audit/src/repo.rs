//! Shared repository state and bootstrap.

use crate::cluster::ClusterClient;
use crate::layout::ResourceDescriptor;
use crate::resource::ResourceKind;
use crate::Result;
use rewind_storage::{ObjectId, Repository, Signature, StorageError, StorageMode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Identity used for the seeding commit.
pub const INIT_AUTHOR: &str = "audit-init";

/// Identity used for rollback commits.
pub const ROLLBACK_AUTHOR: &str = "audit-manager";

/// Email shared by all system identities.
pub const SYSTEM_EMAIL: &str = "system@audit.antrea.io";

/// Message of the seeding commit.
pub const INIT_MESSAGE: &str = "Initial commit of existing policies";

/// Default service account name when none is configured.
pub const DEFAULT_SERVICE_ACCOUNT_NAME: &str = "antrea-audit";

/// Builds the user name the API server reports for a service account.
pub fn service_account_user(namespace: &str, name: &str) -> String {
    format!("system:serviceaccount:{namespace}:{name}")
}

/// Where and how the audit repository is stored.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Disk or memory.
    pub mode: StorageMode,
    /// Repository root for disk mode.
    pub location: PathBuf,
    /// User name of this process's own cluster writes.
    pub service_account: String,
}

/// State guarded by the repository lock.
pub(crate) struct RepoInner {
    pub(crate) store: Repository,
    pub(crate) rollback_in_progress: bool,
}

/// The audit repository shared by every request handler.
///
/// A single async mutex serializes event batches, queries, tagging and
/// rollbacks. The rollback flag is read and written under the same lock.
pub struct RepoState {
    inner: Mutex<RepoInner>,
    mode: StorageMode,
    service_account: String,
    cluster: Arc<dyn ClusterClient>,
}

impl std::fmt::Debug for RepoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoState")
            .field("mode", &self.mode)
            .field("service_account", &self.service_account)
            .finish_non_exhaustive()
    }
}

impl RepoState {
    /// Wraps an already initialized store.
    pub fn new(
        store: Repository,
        service_account: impl Into<String>,
        cluster: Arc<dyn ClusterClient>,
    ) -> Self {
        Self {
            mode: store.mode(),
            inner: Mutex::new(RepoInner {
                store,
                rollback_in_progress: false,
            }),
            service_account: service_account.into(),
            cluster,
        }
    }

    /// Initializes the repository, seeding it from the cluster on first use.
    ///
    /// An existing disk repository is reopened as is.
    pub async fn setup(config: &RepoConfig, cluster: Arc<dyn ClusterClient>) -> Result<Self> {
        let store = match Repository::init(config.mode, &config.location) {
            Ok(store) => store,
            Err(StorageError::AlreadyExists(path)) => {
                tracing::info!(
                    path = %path.display(),
                    "Audit repository already exists, skipping initialization"
                );
                let store = Repository::open(&path)?;
                return Ok(Self::new(store, config.service_account.clone(), cluster));
            }
            Err(e) => return Err(e.into()),
        };

        let state = Self::new(store, config.service_account.clone(), cluster);
        let commit = state.seed().await?;
        tracing::info!(
            mode = %config.mode,
            commit = %commit,
            "Audit repository initialized"
        );
        Ok(state)
    }

    /// Writes every audited resource currently in the cluster and commits once.
    async fn seed(&self) -> Result<ObjectId> {
        let inner = self.inner.lock().await;
        for kind in ResourceKind::ALL {
            inner.store.create_dir(kind.directory())?;
            for resource in self.cluster.list_resources(kind).await? {
                let resource = resource.sanitized();
                let path = ResourceDescriptor::of(kind, &resource).path();
                inner.store.write_file(&path, resource.to_yaml()?.as_bytes())?;
                tracing::debug!(path = %path, "Seeded resource");
            }
        }
        let author = Signature::now(INIT_AUTHOR, SYSTEM_EMAIL);
        Ok(inner.store.commit(&author, INIT_MESSAGE)?)
    }

    /// Storage mode, fixed at creation.
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// User name whose audit events are ignored.
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    /// The cluster client rollbacks drive.
    pub fn cluster(&self) -> &Arc<dyn ClusterClient> {
        &self.cluster
    }

    /// True while a rollback runs or after one failed without recovery.
    ///
    /// Waits for the repository lock.
    pub async fn rollback_in_progress(&self) -> bool {
        self.inner.lock().await.rollback_in_progress
    }

    /// Current HEAD commit.
    pub async fn head(&self) -> Result<ObjectId> {
        Ok(self.inner.lock().await.store.head()?)
    }

    /// Reads a file from the working tree.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.inner.lock().await.store.read_file(path)?.to_vec())
    }

    /// Reads a file as it was at a commit.
    pub async fn read_file_at(&self, commit: &ObjectId, path: &str) -> Result<Vec<u8>> {
        Ok(self
            .inner
            .lock()
            .await
            .store
            .read_file_at(commit, path)?
            .to_vec())
    }

    /// Paths tracked at a commit.
    pub async fn paths_at(&self, commit: &ObjectId) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.store.files_at(commit)?.into_keys().collect())
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, RepoInner> {
        self.inner.lock().await
    }
}
