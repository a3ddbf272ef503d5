//! TOML-based application configuration.
//!
//! Stores user preferences for check-in reminders: whether notifications are
//! shown, the daily target, and how often reminders are evaluated.
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result, ValidationError};
use crate::notify::{DEFAULT_REMINDER_INTERVAL_SECS, DEFAULT_TARGET_SECS};

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Running time after which the threshold reminder fires.
    #[serde(default = "default_target_seconds")]
    pub target_seconds: u64,
    /// Upper bound on how long the reminder loop sleeps between checks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Spacing of reminders once the target has been reached.
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// The subset of configuration a running session needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSettings {
    pub target_seconds: u64,
    pub notifications_enabled: bool,
    pub reminder_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Config::default().settings()
    }
}

fn default_true() -> bool {
    true
}
fn default_target_seconds() -> u64 {
    DEFAULT_TARGET_SECS
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_reminder_interval_secs() -> u64 {
    DEFAULT_REMINDER_INTERVAL_SECS
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_seconds: default_target_seconds(),
            poll_interval_secs: default_poll_interval_secs(),
            reminder_interval_secs: default_reminder_interval_secs(),
        }
    }
}

/// Convert a target in hours to whole seconds, rejecting anything outside
/// `(0, 24]`.
pub fn target_hours_to_seconds(hours: f64) -> Result<u64, ValidationError> {
    if !hours.is_finite() || hours <= 0.0 || hours > 24.0 {
        return Err(ValidationError::TargetHoursOutOfRange(hours));
    }
    Ok(((hours * 3600.0).round() as u64).max(1))
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file inside the data directory.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing the defaults there when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set the daily target from hours, accepting `0 < hours <= 24`.
    pub fn set_target_hours(&mut self, hours: f64) -> Result<()> {
        self.notifications.target_seconds = target_hours_to_seconds(hours)?;
        Ok(())
    }

    pub fn target_hours(&self) -> f64 {
        self.notifications.target_seconds as f64 / 3600.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.notifications;
        if n.target_seconds == 0 || n.target_seconds > 24 * 3600 {
            return Err(ConfigError::InvalidValue {
                key: "notifications.target_seconds".into(),
                message: format!("must be between 1 and 86400, got {}", n.target_seconds),
            });
        }
        for (key, value) in [
            ("notifications.poll_interval_secs", n.poll_interval_secs),
            ("notifications.reminder_interval_secs", n.reminder_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> AppSettings {
        AppSettings {
            target_seconds: self.notifications.target_seconds,
            notifications_enabled: self.notifications.enabled,
            reminder_interval_secs: self.notifications.reminder_interval_secs,
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notifications.poll_interval_secs)
    }
}
