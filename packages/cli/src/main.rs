mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    documents, init, queue, snapshots, DocumentsCommand, InitArgs, QueueCommand, SnapshotsCommand,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Prototyper CLI - inspect and repair local editor persistence
#[derive(Parser, Debug)]
#[command(name = "prototyper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default prototyper.config.json
    Init(InitArgs),

    /// Crash-recovery snapshots
    Snapshots {
        #[command(subcommand)]
        command: SnapshotsCommand,
    },

    /// Saves queued while offline
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Documents in the local store
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot get current directory")?,
    };
    tracing::debug!(cwd = %cwd.display(), "project directory");

    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Snapshots { command } => snapshots(command, &cwd).await,
        Command::Queue { command } => queue(command, &cwd).await,
        Command::Documents { command } => documents(command, &cwd).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
