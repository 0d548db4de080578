use super::format_age;
use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use prototyper_persistence::{LocalDocumentStore, PersistenceConfig};
use std::path::Path;

#[derive(Debug, Subcommand)]
pub enum DocumentsCommand {
    /// List documents, most recently updated first
    List,
}

pub async fn documents(command: DocumentsCommand, cwd: &Path) -> Result<()> {
    let config = PersistenceConfig::load(cwd)?;
    let store = LocalDocumentStore::open(&config.documents_dir).await?;

    match command {
        DocumentsCommand::List => {
            let documents = store.list().await?;
            if documents.is_empty() {
                println!("No documents in {}", store.dir().display());
                return Ok(());
            }

            let now = Utc::now();
            for document in documents {
                let updated = document
                    .updated_at
                    .map(|at| format_age(at, now))
                    .unwrap_or_default();
                println!(
                    "{}  {}  v{}  {}",
                    document.key.to_string().bright_white(),
                    document.name,
                    document.version,
                    updated.dimmed()
                );
            }
            Ok(())
        }
    }
}
