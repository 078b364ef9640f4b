//! Error types for audit processing, queries, tagging and rollback.

use rewind_storage::StorageError;
use thiserror::Error;

/// Errors returned by a [`ClusterClient`](crate::ClusterClient).
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The resource does not exist in the cluster.
    #[error("{kind} {namespace}/{name} not found in cluster")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Namespace, empty for cluster-scoped resources.
        namespace: String,
        /// Resource name.
        name: String,
    },

    /// The resource could not be converted for the API server.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// The API server rejected or failed the request.
    #[error("cluster API error: {0}")]
    Api(String),

    /// The cluster could not be reached.
    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur in the audit and rollback layer.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The versioned store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A rollback holds the repository; audit events are refused.
    #[error("rollback in progress")]
    RollbackInProgress,

    /// A resource file names an apiVersion outside the known set.
    #[error("unknown apiVersion found: {0}")]
    UnknownApiVersion(String),

    /// A resource file names a kind outside the known set.
    #[error("unknown kind found: {0}")]
    UnknownKind(String),

    /// No commit with this hash exists.
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// No tag with this name exists.
    #[error("tag not found: {0}")]
    TagNotFound(String),

    /// A tag with this name already exists.
    #[error("tag already exists: {0}")]
    TagExists(String),

    /// A tag name is not a valid reference name.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A history query carries an unusable filter.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The external cluster call failed.
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// An audit event batch could not be decoded.
    #[error("could not decode event list: {0}")]
    Decode(#[from] serde_json::Error),

    /// A resource file could not be read or written as YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A create or update event carried no response object.
    #[error("audit event for {0} has no response object")]
    MissingResponseObject(String),
}

impl AuditError {
    /// Returns true for errors that mean "nothing found under that name".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CommitNotFound(_)
                | Self::TagNotFound(_)
                | Self::Storage(StorageError::NotFound(_))
                | Self::Cluster(ClusterError::NotFound { .. })
        )
    }
}
