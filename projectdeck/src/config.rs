//! Application configuration
//!
//! Central location for configuration constants, validation boundaries,
//! and the file-backed `AppConfig` loaded at startup.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

// ===== Validation Limits =====

/// Maximum length for project names
pub const MAX_PROJECT_NAME_LENGTH: usize = 120;

/// Maximum length for task titles
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Maximum length for tag names
pub const MAX_TAG_NAME_LENGTH: usize = 50;

/// Maximum length for a comment body
pub const MAX_COMMENT_LENGTH: usize = 10_000;

/// Maximum length for a profile display name
pub const MAX_DISPLAY_NAME_LENGTH: usize = 80;

// ===== Tags =====

/// Color given to tags created without one (mid grey)
pub const DEFAULT_TAG_COLOR: &str = "#808080";

/// Tag names seeded into the global scope on first start
pub const DEFAULT_TAG_NAMES: &[&str] = &[
    "Bug",
    "Feature",
    "Enhancement",
    "Documentation",
    "Design",
    "Testing",
    "Research",
    "Urgent",
    "Backend",
    "Frontend",
    "Database",
    "API",
    "UI/UX",
    "Security",
    "Performance",
];

// ===== Database Pool Limits =====

/// Minimum pool size
pub const MIN_MAX_CONNECTIONS: u32 = 1;

/// Maximum pool size (SQLite serializes writers anyway)
pub const MAX_MAX_CONNECTIONS: u32 = 32;

/// Maximum busy timeout in seconds
pub const MAX_BUSY_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
    /// Whether to seed `default_tags` into the global scope on startup
    #[serde(default = "default_true")]
    pub seed_default_tags: bool,
    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/projectdeck.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_tags() -> Vec<String> {
    DEFAULT_TAG_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_log_filter() -> String {
    "projectdeck=debug,info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            seed_default_tags: true,
            default_tags: default_tags(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if the file is absent
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MAX_CONNECTIONS..=MAX_MAX_CONNECTIONS).contains(&self.max_connections) {
            return Err(AppError::Validation(format!(
                "max_connections must be between {} and {}",
                MIN_MAX_CONNECTIONS, MAX_MAX_CONNECTIONS
            )));
        }
        if self.busy_timeout_secs > MAX_BUSY_TIMEOUT_SECS {
            return Err(AppError::Validation(format!(
                "busy_timeout_secs must be at most {}",
                MAX_BUSY_TIMEOUT_SECS
            )));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(AppError::Validation(
                "database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
