use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete merchsync configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Relational store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding tenants and provider links
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "merchsync.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Snapshot archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Root of the filesystem object store
    #[serde(default = "default_snapshot_root")]
    pub root_dir: String,
}

fn default_snapshot_root() -> String {
    "snapshots".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            root_dir: default_snapshot_root(),
        }
    }
}

/// Daily schedule configuration (fixed time, UTC)
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_fire_hour")]
    pub hour: u32,
    #[serde(default = "default_fire_minute")]
    pub minute: u32,
}

fn default_fire_hour() -> u32 {
    3
}

fn default_fire_minute() -> u32 {
    30
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: default_fire_hour(),
            minute: default_fire_minute(),
        }
    }
}

/// Orchestrator tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Fixed pause between tenants (rate-limit backpressure)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Items requested per provider API page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Hard cap on pages fetched per dataset
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Links synced within this window are skipped by unforced runs
    #[serde(default = "default_min_interval_hours")]
    pub min_sync_interval_hours: i64,
}

fn default_pacing_ms() -> u64 {
    1000
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    50
}

fn default_min_interval_hours() -> i64 {
    20
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            min_sync_interval_hours: default_min_interval_hours(),
        }
    }
}

/// Trigger API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    3001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            snapshot: SnapshotConfig::default(),
            schedule: ScheduleConfig::default(),
            sync: SyncConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: AppConfig = toml::from_str(&contents).context("Failed to parse config TOML")?;

    if config.schedule.hour > 23 {
        anyhow::bail!(
            "schedule.hour must be 0-23, got {}",
            config.schedule.hour
        );
    }
    if config.schedule.minute > 59 {
        anyhow::bail!(
            "schedule.minute must be 0-59, got {}",
            config.schedule.minute
        );
    }

    Ok(config)
}
