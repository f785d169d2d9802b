//! XDG config store adapter
//!
//! Settings live in `$XDG_CONFIG_HOME/sound-recorder/config.toml`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::warn;
use tokio::fs;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Directory under the user config directory
pub const CONFIG_DIR_NAME: &str = "sound-recorder";
const CONFIG_FILE_NAME: &str = "config.toml";

/// XDG-compliant config store
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(CONFIG_DIR_NAME);

        Self {
            path: config_dir.join(CONFIG_FILE_NAME),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse TOML content. Keys this version does not know are reported
    /// and skipped.
    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for key in unknown_keys(&table) {
            warn!("ignoring unknown config key '{}'", key);
        }

        table
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))
    }

    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    /// Sibling file the new contents are written to before the rename
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CONFIG_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_keys(table: &toml::Table) -> Vec<&str> {
    table
        .keys()
        .map(String::as_str)
        .filter(|key| !AppConfig::KEYS.contains(key))
        .collect()
}

async fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string())),
        _ => Ok(()),
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            return Ok(AppConfig::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    /// Replace the file atomically so a running daemon never reads half of it.
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        ensure_parent(&self.path).await?;

        let content = Self::to_toml(config)?;
        let staging = self.staging_path();
        fs::write(&staging, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(ConfigError::WriteError(e.to_string()));
        }
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        self.save(&AppConfig::defaults()).await
    }
}
