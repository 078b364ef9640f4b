//! # Rewind Node
//!
//! HTTP front end of the audit repository.
//!
//! ```text
//!   API server audit webhook          rewind CLI
//!             │                            │
//!             ▼                            ▼
//!        POST /events        /changes /tag /rollback
//!             └──────────────┬─────────────┘
//!                            ▼
//!                   RepoState (rewind-audit)
//!                     │                │
//!                     ▼                ▼
//!           git repository      KubeCluster (kube)
//! ```
//!
//! - [`api`]: axum router and error mapping
//! - [`config`]: layered [`NodeConfig`](config::NodeConfig)
//! - [`kube_client`]: [`ClusterClient`](rewind_audit::ClusterClient) on the Kubernetes API
//! - [`observability`]: tracing subscriber setup
//! - [`validation`]: request validation

pub mod api;
pub mod config;
pub mod kube_client;
pub mod observability;
pub mod validation;

pub use api::{create_router, ApiError, AppState};
pub use config::NodeConfig;
pub use kube_client::KubeCluster;
