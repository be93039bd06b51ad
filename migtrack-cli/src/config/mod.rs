//! Application configuration
//!
//! Read from `$MIGTRACK_CONFIG` or `~/.config/migtrack/config.toml`. Every key
//! is optional; `MIGTRACK_DB` and `MIGTRACK_BATCH_SIZE` override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::import::DEFAULT_PROGRESS_INTERVAL;
use crate::store::DEFAULT_BATCH_SIZE;

pub const CONFIG_ENV: &str = "MIGTRACK_CONFIG";
pub const DATABASE_ENV: &str = "MIGTRACK_DB";
pub const BATCH_SIZE_ENV: &str = "MIGTRACK_BATCH_SIZE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding committed records
    pub database_path: PathBuf,
    /// Records per storage batch
    pub batch_size: usize,
    /// Rows between progress updates during decoding
    pub progress_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// ~/.local/share/migtrack/migtrack.db (platform equivalent)
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("migtrack")
        .join("migtrack.db")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("migtrack")
        .join("config.toml")
}

impl Config {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for environment variables
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(size) = lookup(BATCH_SIZE_ENV).filter(|v| !v.trim().is_empty()) {
            self.batch_size = size
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", BATCH_SIZE_ENV, size))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.progress_interval == 0 {
            bail!("progress_interval must be at least 1");
        }
        Ok(())
    }
}
