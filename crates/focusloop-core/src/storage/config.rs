//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Default session durations and the long-break cadence
//! - Attention-tracking options
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/focusloop/config.toml`. The values
//! here are defaults for a fresh session; the live session persists its own
//! settings in the snapshot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::session::SessionSettings;

/// Default session durations, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
}

/// Attention-tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Label attached to focus metrics (optional).
    #[serde(default)]
    pub session_label: Option<String>,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusloop/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_label: None,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SessionConfig {
    /// Session settings with invalid fields replaced by the defaults.
    pub fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            focus_minutes: self.focus_minutes,
            break_minutes: self.break_minutes,
            long_break_minutes: self.long_break_minutes,
            long_break_interval: self.long_break_interval,
        }
        .sanitized(&SessionSettings::default())
    }
}

impl Config {
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::DataDir(e.to_string()))?;
        Ok(dir.join("config.toml"))
    }

    /// Load the config, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, contents).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_session_defaults() {
        let config = Config::default();
        assert_eq!(config.session.to_settings(), SessionSettings::default());
        assert!(config.tracking.enabled);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.session.focus_minutes = 50;
        config.tracking.session_label = Some("deep work".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.session.focus_minutes, 50);
        assert_eq!(loaded.tracking.session_label.as_deref(), Some("deep work"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.session.focus_minutes, 25);
    }

    #[test]
    fn invalid_session_values_are_sanitized() {
        let config = SessionConfig {
            focus_minutes: 0,
            break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 1,
        };
        let settings = config.to_settings();
        assert_eq!(settings.focus_minutes, 25);
        assert_eq!(settings.long_break_interval, 4);
    }
}
