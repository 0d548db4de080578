use super::format_age;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use prototyper_persistence::{
    Connectivity, HttpTransport, OfflineQueue, PersistenceConfig, RemoteSaveExecutor, SaveQueue,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List saves waiting for connectivity
    List,

    /// Replay queued saves against the server
    Drain {
        /// Bearer token for the API
        #[arg(long)]
        token: String,

        /// Override the configured API root
        #[arg(long)]
        api_base_url: Option<String>,
    },
}

pub async fn queue(command: QueueCommand, cwd: &Path) -> Result<()> {
    let config = PersistenceConfig::load(cwd)?;
    let offline = OfflineQueue::load(&config.offline_queue_path).await?;

    match command {
        QueueCommand::List => list(&offline).await,
        QueueCommand::Drain { token, api_base_url } => {
            let base_url = api_base_url.or_else(|| config.api_base_url.clone()).context(
                "No API configured. Set apiBaseUrl in prototyper.config.json or pass --api-base-url",
            )?;
            drain(&offline, &config, base_url, token).await
        }
    }
}

async fn list(offline: &OfflineQueue) -> Result<()> {
    let entries = offline.entries().await;
    if entries.is_empty() {
        println!("Offline queue is empty");
        return Ok(());
    }

    let now = Utc::now();
    for entry in entries {
        let target = match &entry.document_key {
            Some(id) => id.to_string().bright_white(),
            None => "(new)".yellow(),
        };
        println!(
            "{}  {}  retries: {}  {}",
            target,
            entry.name,
            entry.retry_count,
            format_age(entry.enqueued_at, now).dimmed()
        );
    }

    Ok(())
}

async fn drain(
    offline: &OfflineQueue,
    config: &PersistenceConfig,
    base_url: String,
    token: String,
) -> Result<()> {
    if offline.is_empty().await {
        println!("Offline queue is empty");
        return Ok(());
    }

    let transport = HttpTransport::new(base_url, token, Connectivity::default())?;
    let executor = RemoteSaveExecutor::new(Arc::new(transport), config.retry_policy());
    let saves = SaveQueue::new(Arc::new(executor));

    println!("{}", "🔁 Replaying offline saves...".bright_blue().bold());
    let report = offline.drain(&saves).await;

    for (_, document) in &report.replayed {
        println!(
            "  {} {} (version {})",
            "✓".green(),
            document.name,
            document.version
        );
    }
    if report.dropped > 0 {
        println!("  {} Dropped {} rejected save(s)", "✗".red(), report.dropped);
    }
    if report.remaining > 0 {
        println!(
            "  {} {} save(s) still queued; try again later",
            "⚠️".yellow(),
            report.remaining
        );
    }

    Ok(())
}
