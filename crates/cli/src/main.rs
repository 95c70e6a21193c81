//! Shadow CLI - shadow command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// Shadow - keep an in-memory mirror of a directory tree
#[derive(Parser)]
#[command(name = "shadow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and print every change applied to its shadow tree
    Watch {
        /// Directory to watch
        dir: PathBuf,
        /// Record transactions in a journal at this directory (cleared first)
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Watcher settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Rebuild a tree from a journal and print it
    Replay {
        /// Journal directory
        journal: PathBuf,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a virtual tree interactively
    Shell {
        /// Name of the root node
        #[arg(long, default_value = "fs-shadow")]
        root: String,
        /// Restore from and record to a journal at this directory
        #[arg(long)]
        journal: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Watch {
            dir,
            journal,
            config,
        } => cmd::watch::run(&dir, journal.as_deref(), config.as_deref()).await,
        Commands::Replay { journal, json } => cmd::replay::run(&journal, json),
        Commands::Shell { root, journal } => cmd::shell::run(&root, journal.as_deref()),
    }
}
