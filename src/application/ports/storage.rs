//! Storage volume port interface

use std::io;
use std::path::Path;

/// Free-space snapshot of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    /// Blocks available to unprivileged writers
    pub available_blocks: u64,
    pub block_size: u64,
}

impl VolumeStats {
    pub const fn available_bytes(&self) -> u64 {
        self.available_blocks.saturating_mul(self.block_size)
    }
}

/// Port for the volume recordings are written to
pub trait StorageVolume: Send + Sync {
    /// Root directory recordings live in
    fn root(&self) -> &Path;

    /// The volume is mounted and its root is usable
    fn is_ready(&self) -> bool;

    fn stats(&self) -> io::Result<VolumeStats>;
}
