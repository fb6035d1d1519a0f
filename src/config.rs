// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables and the
//! `.config` file.
//!
//! Everything is resolved once at startup and passed explicitly to the
//! components that need it.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the YAML config file (relative to the working directory).
pub const CONFIG_FILE: &str = ".config";

/// Default Garmin session token directory.
pub const DEFAULT_TOKEN_STORE: &str = ".garth";

/// Intervals.icu API credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalsCredentials {
    pub athlete_id: String,
    pub api_key: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Secrets ---
    /// Garmin Connect account email
    pub garmin_username: Option<String>,
    /// Garmin Connect password
    pub garmin_password: Option<String>,
    /// Intervals.icu credentials; name lookup is disabled without them
    pub intervals: Option<IntervalsCredentials>,

    // --- Local state ---
    /// Directory holding the cached Garmin session
    pub token_store: PathBuf,
    /// TPV user directory name from the config file
    pub tpv_id: Option<String>,

    // --- Behaviour ---
    /// Suppress all persistent writes and remote calls
    pub dry_run: bool,
    /// Wait after upload before looking the activity up again
    pub grace_period: Duration,
    /// Wait after a file creation event before reading the file
    pub settle_delay: Duration,
    /// Maximum distance between FIT and Garmin start times when renaming
    pub match_tolerance: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            garmin_username: Some("rider@example.com".to_string()),
            garmin_password: Some("test_password".to_string()),
            intervals: None,
            token_store: PathBuf::from(DEFAULT_TOKEN_STORE),
            tpv_id: None,
            dry_run: false,
            grace_period: Duration::ZERO,
            settle_delay: Duration::ZERO,
            match_tolerance: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let intervals = match (non_empty("INTERVALS_ATHLETEID"), non_empty("INTERVALS_APIKEY")) {
            (Some(athlete_id), Some(api_key)) => Some(IntervalsCredentials {
                athlete_id,
                api_key,
            }),
            _ => None,
        };

        Self {
            garmin_username: non_empty("GARMIN_USERNAME"),
            garmin_password: lookup("GARMIN_PASSWORD").filter(|v| !v.is_empty()),
            intervals,
            token_store: non_empty("GARMINTOKENS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_STORE)),
            tpv_id: None,
            dry_run: false,
            grace_period: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
            match_tolerance: Duration::from_secs(10),
        }
    }

    /// Merge in the values from a parsed config file.
    pub fn with_file(mut self, file: ConfigFile) -> Self {
        self.tpv_id = Some(file.tpv_id);
        self
    }

    /// Garmin credentials, required for unattended (daemon) operation.
    pub fn require_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let username = self
            .garmin_username
            .as_deref()
            .ok_or(ConfigError::Missing("GARMIN_USERNAME"))?;
        let password = self
            .garmin_password
            .as_deref()
            .ok_or(ConfigError::Missing("GARMIN_PASSWORD"))?;
        Ok((username, password))
    }

    /// The configured TPV user directory name.
    pub fn require_tpv_id(&self) -> Result<&str, ConfigError> {
        self.tpv_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::Missing("TPV_ID"))
    }
}

/// Contents of the YAML config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(rename = "TPV_ID")]
    pub tpv_id: String,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text =
            serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Cannot access config file {0}")]
    File(String),

    #[error("Invalid config file {0}")]
    Parse(String),
}
