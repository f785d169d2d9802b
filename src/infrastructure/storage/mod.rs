//! Storage infrastructure module

mod local_volume;

pub use local_volume::LocalVolume;
