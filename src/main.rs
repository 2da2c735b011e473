use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mneme::cli;
use mneme::config::MnemeConfig;
use mneme::server;

#[derive(Parser)]
#[command(name = "mneme", version, about = "Persistent local semantic memory for conversations and notes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and ingest a markdown file into the store
    Ingest {
        /// Path to the markdown file
        #[arg(long)]
        file: PathBuf,
        /// Fallback date for sections without one in their header (YYYY-MM-DD)
        #[arg(long)]
        valid_at: Option<String>,
    },
    /// Search for relevant chunks (debug output)
    Search {
        /// Search query
        query: String,
        /// Exclude chunks dated after this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
        /// Maximum chunks to retrieve
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Find all mentions of an entity in chronological order
    History {
        /// Entity name (aliases are searched too)
        entity: String,
        /// Maximum chunks to retrieve
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show system status and health
    Status,
    /// Start the MCP server (stdio transport)
    Serve,
    /// Watch a live OpenCode session and auto-ingest new messages
    #[command(name = "watch-oc")]
    WatchOc {
        /// Messages to buffer before ingesting
        #[arg(long)]
        batch: Option<usize>,
        /// Poll interval in seconds
        #[arg(long)]
        poll: Option<u64>,
    },
    /// Watch a live Claude Code session and auto-ingest new messages
    #[command(name = "watch-cc")]
    WatchCc {
        /// Messages to buffer before ingesting
        #[arg(long)]
        batch: Option<usize>,
        /// Poll interval in seconds
        #[arg(long)]
        poll: Option<u64>,
    },
    /// Print the version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MnemeConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest { file, valid_at } => {
            cli::run_ingest(&config, &file, valid_at.as_deref())
        }
        Command::Search {
            query,
            as_of,
            limit,
        } => cli::run_search(&config, &query, limit, as_of.as_deref()),
        Command::History { entity, limit } => cli::run_history(&config, &entity, limit),
        Command::Status => cli::run_status(&config),
        Command::Serve => server::serve_stdio(config),
        Command::WatchOc { batch, poll } => {
            let batch = batch.unwrap_or(config.watch.batch_size);
            let poll = poll.unwrap_or(config.watch.poll_interval_secs);
            cli::run_watch_oc(&config, batch, poll)
        }
        Command::WatchCc { batch, poll } => {
            let batch = batch.unwrap_or(config.watch.batch_size);
            let poll = poll.unwrap_or(config.watch.poll_interval_secs);
            cli::run_watch_cc(&config, batch, poll)
        }
        Command::Version => {
            println!("mneme {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
