//! Node configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. `REWIND_*` environment variables (e.g. `REWIND_API_ADDR`)
//! 4. command-line flags, applied by the binary

use rewind_audit::{service_account_user, DEFAULT_SERVICE_ACCOUNT_NAME};
use rewind_storage::StorageMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming this process's service account.
pub const SERVICE_ACCOUNT_ENV: &str = "SERVICEACCOUNT_NAME";

/// Environment variable naming the namespace the node runs in.
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "REWIND";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
    #[error("could not encode defaults: {0}")]
    Defaults(#[from] serde_json::Error),
}

/// Where the audit repository lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// A git repository on disk.
    #[default]
    Disk,
    /// Process memory; lost on exit.
    Memory,
}

impl From<StorageKind> for StorageMode {
    fn from(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Disk => StorageMode::Disk,
            StorageKind::Memory => StorageMode::InMemory,
        }
    }
}

/// Configuration for the Rewind node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen address.
    pub api_addr: SocketAddr,
    /// Audit repository directory.
    pub repo_dir: PathBuf,
    /// Storage backend.
    pub storage_mode: StorageKind,
    /// User name of this node's own cluster writes.
    pub service_account: String,
    /// Log level.
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
    /// Use an in-memory cluster instead of the Kubernetes API.
    pub offline: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            repo_dir: PathBuf::from("./resource-auditing-repo"),
            storage_mode: StorageKind::Disk,
            service_account: default_service_account(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            offline: false,
        }
    }
}

/// Service account user derived from the pod environment.
pub fn default_service_account() -> String {
    let name = std::env::var(SERVICE_ACCOUNT_ENV)
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT_NAME.to_string());
    let namespace = std::env::var(POD_NAMESPACE_ENV).unwrap_or_default();
    service_account_user(&namespace, &name)
}

impl NodeConfig {
    /// Loads defaults, then `path` if given, then the environment.
    ///
    /// A missing file is an error only when `required` is set.
    pub fn load(path: Option<&Path>, required: bool) -> Result<Self, ConfigError> {
        let defaults = serde_json::to_string(&Self::default())?;
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Json));

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            } else if required {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
