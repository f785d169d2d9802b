//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::{ByteSize, Duration, OutputFormat, Quality};

/// Directory name used under the user's audio directory
pub const DEFAULT_RECORDINGS_DIR_NAME: &str = "sound_recorder";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub format: Option<String>,
    pub high_quality: Option<bool>,
    pub max_file_size: Option<String>,
    pub recordings_dir: Option<String>,
    pub low_storage_threshold: Option<String>,
    pub notify: Option<bool>,
}

impl AppConfig {
    /// Keys accepted in the config file and by `config set`
    pub const KEYS: &'static [&'static str] = &[
        "format",
        "high_quality",
        "max_file_size",
        "recordings_dir",
        "low_storage_threshold",
        "notify",
    ];

    /// Create config with default values.
    /// `max_file_size` has no default: recordings are bounded by disk space only.
    pub fn defaults() -> Self {
        Self {
            format: Some(OutputFormat::default().to_string()),
            high_quality: Some(false),
            max_file_size: None,
            recordings_dir: Some(default_recordings_dir().to_string_lossy().to_string()),
            low_storage_threshold: Some(Duration::default_low_storage_threshold().to_string()),
            notify: Some(false),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            format: other.format.or(self.format),
            high_quality: other.high_quality.or(self.high_quality),
            max_file_size: other.max_file_size.or(self.max_file_size),
            recordings_dir: other.recordings_dir.or(self.recordings_dir),
            low_storage_threshold: other.low_storage_threshold.or(self.low_storage_threshold),
            notify: other.notify.or(self.notify),
        }
    }

    /// Get format as parsed OutputFormat, or WAV if not set/invalid
    pub fn format_or_default(&self) -> OutputFormat {
        self.format
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get capture quality, standard unless high quality is enabled
    pub fn quality_or_default(&self) -> Quality {
        Quality::from_high(self.high_quality.unwrap_or(false))
    }

    /// Get the file-size ceiling, if one is configured and valid
    pub fn max_file_size(&self) -> Option<ByteSize> {
        self.max_file_size.as_ref().and_then(|s| s.parse().ok())
    }

    /// Get recordings directory, or the default location if not set
    pub fn recordings_dir_or_default(&self) -> PathBuf {
        self.recordings_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_recordings_dir)
    }

    /// Get low-storage threshold, or 30 minutes if not set/invalid
    pub fn low_storage_threshold_or_default(&self) -> Duration {
        self.low_storage_threshold
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get notify setting, or false if not set
    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }
}

/// `<audio dir>/sound_recorder`, falling back to the home directory
pub fn default_recordings_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_RECORDINGS_DIR_NAME)
}
