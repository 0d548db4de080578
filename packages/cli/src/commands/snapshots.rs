use super::format_age;
use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use prototyper_editor::DocumentKey;
use prototyper_persistence::config::days;
use prototyper_persistence::{FileSnapshotStore, PersistenceConfig, SnapshotStore};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Subcommand)]
pub enum SnapshotsCommand {
    /// List stored snapshots, newest first
    List,

    /// Delete snapshots older than the retention period
    Purge {
        /// Override the configured retention
        #[arg(long)]
        max_age_days: Option<u64>,
    },
}

pub async fn snapshots(command: SnapshotsCommand, cwd: &Path) -> Result<()> {
    let config = PersistenceConfig::load(cwd)?;
    let store = FileSnapshotStore::open(&config.snapshot_dir).await?;

    match command {
        SnapshotsCommand::List => list(&store).await,
        SnapshotsCommand::Purge { max_age_days } => {
            let max_age = match max_age_days {
                Some(max_age_days) => days(max_age_days),
                None => config.retention(),
            };
            purge(&store, max_age).await
        }
    }
}

async fn list(store: &FileSnapshotStore) -> Result<()> {
    let snapshots = store.list().await?;
    if snapshots.is_empty() {
        println!("No recovery snapshots in {}", store.dir().display());
        return Ok(());
    }

    let now = Utc::now();
    for snapshot in snapshots {
        let kind = match DocumentKey::from_store_key(&snapshot.document_id) {
            DocumentKey::Saved(_) => "saved".green(),
            DocumentKey::Unsaved(_) => "never saved".yellow(),
        };
        println!(
            "{}  {}  [{}]  {}",
            snapshot.document_id.bright_white(),
            snapshot.name,
            kind,
            format_age(snapshot.saved_at, now).dimmed()
        );
    }

    Ok(())
}

async fn purge(store: &FileSnapshotStore, max_age: Duration) -> Result<()> {
    let purged = store.purge_older_than(max_age, Utc::now()).await?;
    println!("  {} Purged {} snapshot(s)", "✓".green(), purged);
    Ok(())
}
