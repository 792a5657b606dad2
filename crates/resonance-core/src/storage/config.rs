//! TOML-based application configuration.
//!
//! Stores tunables that are not user preferences:
//! - Drift-correction threshold for the session clock
//! - Whether the tone generator may open an audio device
//! - History retention limits
//!
//! Configuration is stored at `<data dir>/config.toml`. User preferences
//! (volume, breathing cues, default protocol, theme) are persisted
//! separately as the settings document.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use super::json_path::{get_json_value_by_path, set_json_value_by_path};
use crate::error::ConfigError;
use crate::recorder::RecorderConfig;
use crate::timer::ClockSettings;

/// Session clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Hidden intervals shorter than this many seconds are subtracted from
    /// the countdown when the host becomes visible again.
    #[serde(default = "default_drift_correction_limit_secs")]
    pub drift_correction_limit_secs: u64,
}

/// Audio configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Session history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// Default functions
fn default_drift_correction_limit_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_max_sessions() -> usize {
    100
}
fn default_retention_days() -> u32 {
    180
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            drift_correction_limit_secs: default_drift_correction_limit_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            retention_days: default_retention_days(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        if get_json_value_by_path(&json, key).is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        set_json_value_by_path(&mut json, key, value).map_err(invalid)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Clock tunables derived from this config.
    pub fn clock_settings(&self, breathing_cues_enabled: bool) -> ClockSettings {
        ClockSettings {
            drift_correction_limit: Duration::from_secs(self.timer.drift_correction_limit_secs),
            breathing_cues_enabled,
        }
    }

    /// Retention limits for the session recorder.
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            max_sessions: self.storage.max_sessions,
            retention: chrono::Duration::days(i64::from(self.storage.retention_days)),
        }
    }
}
