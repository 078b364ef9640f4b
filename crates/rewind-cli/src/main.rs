//! Rewind CLI - query, tag and roll back the audit repository.

use clap::{ArgGroup, Parser, Subcommand};
use rewind_types::{DEFAULT_TAG_AUTHOR, DEFAULT_TAG_EMAIL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;

use client::{ChangeFilter, RewindClient, DEFAULT_SERVER};

/// Rewind - manage the network policy audit repository
#[derive(Parser, Debug)]
#[command(name = "rewind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Node address
    #[arg(long, default_value = DEFAULT_SERVER, global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List recorded changes
    Get {
        /// Author of changes
        #[arg(short, long)]
        author: Option<String>,
        /// Start of time range (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long)]
        since: Option<String>,
        /// End of time range (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long)]
        until: Option<String>,
        /// Resource category to filter by, e.g. antrea-policies
        #[arg(short, long)]
        resource: Option<String>,
        /// Namespace to filter by
        #[arg(short = 'p', long)]
        namespace: Option<String>,
        /// Resource name to filter by
        #[arg(short, long)]
        name: Option<String>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Tag commits in the repository
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// List tags
    Tags,

    /// Roll back to a tagged or given commit
    #[command(group(ArgGroup::new("target").required(true).args(["tag", "sha"])))]
    Rollback {
        /// Name of tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Commit hash to roll back to
        #[arg(short, long)]
        sha: Option<String>,
    },

    /// Accept audits again after a failed rollback
    Recover,
}

#[derive(Subcommand, Debug)]
enum TagCommands {
    /// Create a tag
    Create {
        /// Tag name
        tag: String,
        /// Commit hash, or HEAD
        sha: String,
        /// Tag author
        #[arg(short, long, default_value = DEFAULT_TAG_AUTHOR)]
        author: String,
        /// Tag email
        #[arg(short, long, default_value = DEFAULT_TAG_EMAIL)]
        email: String,
    },

    /// Delete a tag
    Delete {
        /// Tag name
        tag: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rewind={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> client::Result<()> {
    let client = RewindClient::new(cli.server)?;
    match cli.command {
        Commands::Get {
            author,
            since,
            until,
            resource,
            namespace,
            name,
            json,
        } => {
            let filter = ChangeFilter {
                author,
                since,
                until,
                resource,
                namespace,
                name,
            };
            commands::get(&client, &filter, json).await
        }
        Commands::Tag { command } => match command {
            TagCommands::Create {
                tag,
                sha,
                author,
                email,
            } => commands::tag_create(&client, &tag, &sha, &author, &email).await,
            TagCommands::Delete { tag } => commands::tag_delete(&client, &tag).await,
        },
        Commands::Tags => commands::tags(&client).await,
        Commands::Rollback { tag, sha } => commands::rollback(&client, tag, sha).await,
        Commands::Recover => commands::recover(&client).await,
    }
}
