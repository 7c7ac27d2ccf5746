//! Application configuration.
//!
//! Loaded from TOML; every field has a default so a partial or missing
//! file is fine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::models::{Direction, DEFAULT_MAX_ROWS};

/// Export defaults, overridable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum number of messages to fetch.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Retrieval direction.
    #[serde(default)]
    pub direction: Direction,

    /// Time anchor in seconds since the epoch (0 = latest for backward).
    #[serde(default)]
    pub anchor: i64,

    /// Output CSV path.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            direction: Direction::default(),
            anchor: 0,
            output: default_output(),
        }
    }
}

const fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

fn default_output() -> PathBuf {
    PathBuf::from("messages.csv")
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also append log lines to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wechat-chat-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }
}
