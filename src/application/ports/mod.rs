//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod encoder;
pub mod host;
pub mod notifier;
pub mod player;
pub mod storage;

// Re-export common types
pub use catalog::{CatalogEntry, CatalogError, CatalogId, CatalogSink};
pub use clock::{Clock, SystemClock};
pub use config::ConfigStore;
pub use encoder::{
    AmplitudeGauge, AudioEncoder, EncoderError, EncoderFault, FaultReporter, MAX_AMPLITUDE,
};
pub use host::{HostEnvironment, WakeLock, WakeLockError};
pub use notifier::{NotificationError, NotificationIcon, Notifier};
pub use player::{AudioPlayer, PlaybackError};
pub use storage::{StorageVolume, VolumeStats};
