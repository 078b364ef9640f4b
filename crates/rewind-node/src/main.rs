//! Rewind node: records network-policy changes and serves rollbacks.

use anyhow::Context;
use clap::Parser;
use rewind_audit::{ClusterClient, MemoryCluster, RepoConfig, RepoState};
use rewind_node::config::{NodeConfig, StorageKind};
use rewind_node::observability::{init_logging, LogFormat};
use rewind_node::{create_router, AppState, KubeCluster};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Rewind node - audit and roll back network policies
#[derive(Parser, Debug)]
#[command(name = "rewind-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rewind.yaml")]
    config: PathBuf,

    /// API listen address
    #[arg(long)]
    api_addr: Option<SocketAddr>,

    /// Directory of the audit repository
    #[arg(short = 'd', long)]
    repo_dir: Option<PathBuf>,

    /// Storage backend (disk or memory)
    #[arg(long, value_parser = parse_storage)]
    storage_mode: Option<StorageKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty or json)
    #[arg(long)]
    log_format: Option<String>,

    /// Use an in-memory cluster instead of the Kubernetes API
    #[arg(long)]
    offline: bool,
}

fn parse_storage(s: &str) -> Result<StorageKind, String> {
    match s {
        "disk" => Ok(StorageKind::Disk),
        "memory" => Ok(StorageKind::Memory),
        other => Err(format!("unknown storage mode {other:?}, expected disk or memory")),
    }
}

impl Args {
    fn apply(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(addr) = self.api_addr {
            config.api_addr = addr;
        }
        if let Some(dir) = self.repo_dir {
            config.repo_dir = dir;
        }
        if let Some(mode) = self.storage_mode {
            config.storage_mode = mode;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.offline |= self.offline;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = NodeConfig::load(Some(args.config.as_path()), false)
        .context("loading configuration")?;
    let config = args.apply(config);

    init_logging(&config.log_level, LogFormat::parse(&config.log_format));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Rewind node");
    tracing::info!(
        api_addr = %config.api_addr,
        repo_dir = %config.repo_dir.display(),
        storage = ?config.storage_mode,
        service_account = %config.service_account,
        offline = config.offline,
        "Node configuration"
    );

    let cluster: Arc<dyn ClusterClient> = if config.offline {
        tracing::warn!("Running offline against an in-memory cluster");
        Arc::new(MemoryCluster::new())
    } else {
        Arc::new(
            KubeCluster::try_default()
                .await
                .context("connecting to the Kubernetes API")?,
        )
    };

    let repo_config = RepoConfig {
        mode: config.storage_mode.into(),
        location: config.repo_dir.clone(),
        service_account: config.service_account.clone(),
    };
    let repo = RepoState::setup(&repo_config, cluster)
        .await
        .context("setting up the audit repository")?;

    let app = create_router(AppState {
        repo: Arc::new(repo),
    });
    let listener = tokio::net::TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("binding {}", config.api_addr))?;
    tracing::info!(addr = %config.api_addr, "Audit webhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("Rewind node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
