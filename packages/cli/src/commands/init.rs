use anyhow::Result;
use clap::Args;
use colored::Colorize;
use prototyper_persistence::{PersistenceConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Remote API root; omit to keep documents on disk
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = PersistenceConfig {
        api_base_url: args.api_base_url,
        ..PersistenceConfig::default()
    };

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    match &config.api_base_url {
        Some(url) => println!("  Saving to {}", url.bright_white()),
        None => println!(
            "  Saving to {}",
            config.documents_dir.display().to_string().bright_white()
        ),
    }

    Ok(())
}
