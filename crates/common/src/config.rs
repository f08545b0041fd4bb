//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Grace window (ms) granted to the leading player before the waiting
/// player is released. Compensates decoder start-up inertia; empirical,
/// not validated beyond typical 24-60 fps material.
pub const DEFAULT_CATCH_UP_GRACE_MS: i64 = 24;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dual playback synchronization preferences.
    #[serde(default)]
    pub sync: SyncPreferences,

    /// Composite export defaults.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Preferences consulted by the synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPreferences {
    /// Force the other player to the same speed when one changes.
    pub lock_speeds: bool,

    /// Catch-up grace window in milliseconds.
    pub catch_up_grace_ms: i64,
}

/// Defaults for composite video export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Lay the two images side by side (true) or stacked (false).
    pub horizontal: bool,

    /// Capacity of the progress queue between the export worker and the UI.
    pub progress_channel_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dualsync=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            lock_speeds: false,
            catch_up_grace_ms: DEFAULT_CATCH_UP_GRACE_MS,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            horizontal: true,
            progress_channel_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("dualsync").join("config.json")
}
