//! Engine Settings
//!
//! Read-only engine configuration loaded once at startup:
//! - Explicit FFmpeg/FFprobe paths
//! - Hardware acceleration preference
//! - Probe timeout and log directory
//!
//! Storage location: {config_dir}/vidmerge/settings.json
//!
//! Loading never fails. A missing file yields defaults and a corrupted one is
//! logged and replaced by defaults in memory. Nothing is ever written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::ffmpeg::HwAccelPreference;

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Directory under the platform config dir
pub const APP_DIR_NAME: &str = "vidmerge";

/// Accepted `hardwareAcceleration` values
pub const HW_ACCEL_VALUES: &[&str] = &["auto", "off", "videotoolbox", "nvenc", "qsv", "amf"];

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Explicit ffmpeg binary
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe binary
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// "auto", "off", or a backend name
    #[serde(default = "default_hw_accel")]
    pub hardware_acceleration: String,

    /// Per-file probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Directory for the rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_hw_accel() -> String {
    "auto".to_string()
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            ffmpeg_path: None,
            ffprobe_path: None,
            hardware_acceleration: default_hw_accel(),
            probe_timeout_secs: default_probe_timeout(),
            log_dir: None,
        }
    }
}

impl EngineSettings {
    /// Normalizes and clamps settings so loaded state is always valid.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.hardware_acceleration = normalize_enum(
            &self.hardware_acceleration,
            HW_ACCEL_VALUES,
            default_hw_accel(),
        );
        self.probe_timeout_secs = self.probe_timeout_secs.clamp(1, 600);

        self.ffmpeg_path = non_empty_path(self.ffmpeg_path.take());
        self.ffprobe_path = non_empty_path(self.ffprobe_path.take());
        self.log_dir = non_empty_path(self.log_dir.take());
    }

    pub fn hw_accel_preference(&self) -> HwAccelPreference {
        HwAccelPreference::parse(&self.hardware_acceleration)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Default settings file location, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

/// Loads engine settings from a JSON file
pub struct SettingsLoader {
    settings_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Loader for an explicit settings file
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: Some(settings_path.into()),
        }
    }

    /// Loader for the platform default location
    pub fn from_default_location() -> Self {
        Self {
            settings_path: default_settings_path(),
        }
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    /// Load settings, returning defaults if the file is missing or invalid
    pub fn load(&self) -> EngineSettings {
        let Some(path) = self.settings_path.as_deref() else {
            info!("No config directory on this platform, using default settings");
            return EngineSettings::default();
        };

        if !path.exists() {
            info!("Settings file not found at {}, using defaults", path.display());
            return EngineSettings::default();
        }

        match read_settings(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                EngineSettings::default()
            }
        }
    }
}

fn read_settings(path: &Path) -> Result<EngineSettings, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings file: {}", e))?;

    let mut settings = serde_json::from_str::<EngineSettings>(&content)
        .map_err(|e| format!("Failed to parse settings file: {}", e))?;

    if settings.version < SETTINGS_VERSION {
        info!(
            "Migrating settings from version {} to {}",
            settings.version, SETTINGS_VERSION
        );
    }

    settings.normalize();
    Ok(settings)
}
