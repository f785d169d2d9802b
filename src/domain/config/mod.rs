//! Configuration domain module

mod app_config;

pub use app_config::{default_recordings_dir, AppConfig, DEFAULT_RECORDINGS_DIR_NAME};
