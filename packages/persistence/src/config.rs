//! Persistence configuration, read from `prototyper.config.json`.

use crate::recovery::RecoveryConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "prototyper.config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Persistence configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Quiet period before a recovery snapshot is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Snapshots older than this are purged on startup
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Directory holding recovery snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// File holding saves made while offline
    #[serde(default = "default_offline_queue_path")]
    pub offline_queue_path: PathBuf,

    /// Directory for documents when running without a server
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Remote API root; local storage is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_manual_attempts")]
    pub manual_attempts: u32,

    #[serde(default = "default_autosave_attempts")]
    pub autosave_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_retention_days() -> u64 {
    7
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".prototyper/recovery")
}

fn default_offline_queue_path() -> PathBuf {
    PathBuf::from(".prototyper/offline-queue.json")
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from(".prototyper/documents")
}

fn default_manual_attempts() -> u32 {
    3
}

fn default_autosave_attempts() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            manual_attempts: default_manual_attempts(),
            autosave_attempts: default_autosave_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retention_days: default_retention_days(),
            snapshot_dir: default_snapshot_dir(),
            offline_queue_path: default_offline_queue_path(),
            documents_dir: default_documents_dir(),
            api_base_url: None,
            retry: RetryConfig::default(),
        }
    }
}

impl PersistenceConfig {
    /// Load config from a directory, falling back to defaults when no
    /// config file exists
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let mut config: PersistenceConfig = serde_json::from_str(&content)?;
            config.resolve_paths(cwd);
            Ok(config)
        } else {
            let mut config = PersistenceConfig::default();
            config.resolve_paths(cwd);
            Ok(config)
        }
    }

    fn resolve_paths(&mut self, cwd: &Path) {
        for path in [
            &mut self.snapshot_dir,
            &mut self.offline_queue_path,
            &mut self.documents_dir,
        ] {
            if path.is_relative() {
                *path = cwd.join(&*path);
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retention(&self) -> Duration {
        days(self.retention_days)
    }

    pub fn recovery(&self) -> RecoveryConfig {
        RecoveryConfig {
            debounce: self.debounce(),
            retention: self.retention(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            manual_attempts: self.retry.manual_attempts.max(1),
            autosave_attempts: self.retry.autosave_attempts.max(1),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

/// Whole days as a duration, saturating instead of overflowing
pub fn days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(24 * 60 * 60))
}
