//! Configuration port interface

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Port for persisted recorder settings
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load settings. A missing file yields an empty config.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write the default settings. Fails if the file already exists.
    async fn init(&self) -> Result<(), ConfigError>;
}
