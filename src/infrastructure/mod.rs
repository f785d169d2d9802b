//! Infrastructure layer - Adapter implementations
//!
//! Concrete implementations of the port interfaces: cpal capture, rodio
//! playback, the local volume, desktop notifications and the files the
//! recorder keeps on disk.

pub mod catalog;
pub mod config;
pub mod host;
pub mod notification;
pub mod playback;
pub mod recording;
pub mod storage;

// Re-export adapters
pub use catalog::JsonCatalog;
pub use config::XdgConfigStore;
pub use host::{DesktopHost, SleepInhibitor};
pub use notification::NotifyRustNotifier;
pub use playback::RodioPlayer;
pub use recording::CpalEncoder;
pub use storage::LocalVolume;
