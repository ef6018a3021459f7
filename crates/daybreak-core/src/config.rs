//! TOML-based application configuration.
//!
//! Stores the delivery tunables:
//! - Wake lease bounds (maximum hold, release grace)
//! - Vibration waveform
//! - Notification channel identity
//!
//! Configuration is stored at `~/.config/daybreak/config.toml`.
//! Set `DAYBREAK_ENV=dev` to use a separate development directory.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Wake lease bounds.
///
/// The defaults match the long-standing delivery behavior: a 60 second hard
/// ceiling enforced by the wake facility and a 10 second grace window after
/// which the deferred release fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Maximum seconds the lease may be held before the wake facility
    /// force-expires it.
    #[serde(default = "default_max_hold_secs")]
    pub max_hold_secs: u64,
    /// Seconds before the deferred release fires. Long enough for the alarm
    /// surface to take over the screen, short enough to avoid draining the
    /// battery when it doesn't.
    #[serde(default = "default_release_grace_secs")]
    pub release_grace_secs: u64,
}

impl WakeConfig {
    pub fn max_hold(&self) -> Duration {
        Duration::from_secs(self.max_hold_secs)
    }

    pub fn release_grace(&self) -> Duration {
        Duration::from_secs(self.release_grace_secs)
    }
}

/// Vibration waveform configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationConfig {
    /// Off/on timing segments in milliseconds, starting with an initial
    /// delay segment.
    #[serde(default = "default_vibration_timings")]
    pub timings_ms: Vec<u64>,
    /// Per-segment amplitudes (0-255) for amplitude-capable hardware.
    #[serde(default = "default_vibration_amplitudes")]
    pub amplitudes: Vec<u8>,
    /// Repeat from the first segment until cancelled.
    #[serde(default = "default_true")]
    pub repeat: bool,
}

/// Notification channel identity for alarm-class notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    #[serde(default = "default_channel_description")]
    pub channel_description: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/daybreak/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub vibration: VibrationConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_max_hold_secs() -> u64 {
    60
}
fn default_release_grace_secs() -> u64 {
    10
}
fn default_vibration_timings() -> Vec<u64> {
    vec![0, 1000, 500, 1000, 500, 1000]
}
fn default_vibration_amplitudes() -> Vec<u8> {
    vec![0, 255, 0, 255, 0, 255]
}
fn default_true() -> bool {
    true
}
fn default_channel_id() -> String {
    "alarm_channel".into()
}
fn default_channel_name() -> String {
    "Daybreak Alarms".into()
}
fn default_channel_description() -> String {
    "Alarm notifications".into()
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            max_hold_secs: default_max_hold_secs(),
            release_grace_secs: default_release_grace_secs(),
        }
    }
}

impl Default for VibrationConfig {
    fn default() -> Self {
        Self {
            timings_ms: default_vibration_timings(),
            amplitudes: default_vibration_amplitudes(),
            repeat: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_id: default_channel_id(),
            channel_name: default_channel_name(),
            channel_description: default_channel_description(),
        }
    }
}

/// Returns `~/.config/daybreak[-dev]/` based on DAYBREAK_ENV.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DAYBREAK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("daybreak-dev")
    } else {
        base_dir.join("daybreak")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DirUnavailable(e.to_string()))?;
    Ok(dir)
}

impl Config {
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults on a missing file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut val = &json;
        for part in key.split('.') {
            val = val.get(part)?;
        }
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.wake.max_hold_secs, 60);
        assert_eq!(parsed.wake.release_grace_secs, 10);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = Config::parse("[wake]\nrelease_grace_secs = 3\n").unwrap();
        assert_eq!(cfg.wake.release_grace_secs, 3);
        assert_eq!(cfg.wake.max_hold_secs, 60);
        assert_eq!(cfg.vibration.timings_ms, vec![0, 1000, 500, 1000, 500, 1000]);
        assert_eq!(cfg.notifications.channel_id, "alarm_channel");
    }

    #[test]
    fn save_to_writes_readable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::default();
        cfg.save_to(&path).unwrap();
        let reread = Config::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reread, cfg);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("wake.max_hold_secs").as_deref(), Some("60"));
        assert_eq!(
            cfg.get("notifications.channel_id").as_deref(),
            Some("alarm_channel")
        );
        assert_eq!(cfg.get("nope.nothing"), None);
    }
}
