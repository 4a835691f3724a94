//! Application configuration management.
//!
//! Holds the session time-to-live, the expiry poll interval, an optional
//! override for where the session slot lives, and the last e-mail used to
//! sign in.
//!
//! Configuration is stored at `~/.config/persian-admin/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{SessionSettings, SESSION_KEY, SESSION_POLL_INTERVAL_SECS, SESSION_TTL_HOURS};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "persian-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session_ttl_hours: i64,
    pub poll_interval_secs: u64,
    pub storage_dir: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_ttl_hours: SESSION_TTL_HOURS,
            poll_interval_secs: SESSION_POLL_INTERVAL_SECS,
            storage_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session slot
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Session settings; non-positive or unrepresentable values fall back
    /// to the defaults
    pub fn session_settings(&self) -> SessionSettings {
        let ttl_hours = if self.session_ttl_hours > 0 {
            self.session_ttl_hours
        } else {
            SESSION_TTL_HOURS
        };
        let poll_secs = if self.poll_interval_secs > 0 {
            self.poll_interval_secs
        } else {
            SESSION_POLL_INTERVAL_SECS
        };
        let ttl = Duration::try_hours(ttl_hours).unwrap_or_else(|| {
            warn!(session_ttl_hours = ttl_hours, "Session TTL out of range, using default");
            Duration::hours(SESSION_TTL_HOURS)
        });
        SessionSettings {
            ttl,
            poll_interval: std::time::Duration::from_secs(poll_secs),
            key: SESSION_KEY.to_string(),
        }
    }
}
