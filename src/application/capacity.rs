//! Remaining-capacity tracking for a running recording

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::application::ports::StorageVolume;
use crate::domain::capacity::{binding_limit, CapacityLimit, LimitKind, NO_LIMIT_SECS};

#[derive(Debug, Clone)]
struct FileCeiling {
    path: PathBuf,
    max_bytes: u64,
    start_offset: u64,
}

/// Estimates how many seconds of audio still fit before the volume fills
/// up or the file reaches its size ceiling.
pub struct CapacityMonitor {
    volume: Option<Arc<dyn StorageVolume>>,
    byte_rate: u64,
    ceiling: Option<FileCeiling>,
    last_limit: CapacityLimit,
}

impl CapacityMonitor {
    /// Monitor bounded by the free space of `volume`
    pub fn new(volume: Arc<dyn StorageVolume>) -> Self {
        Self {
            volume: Some(volume),
            byte_rate: 0,
            ceiling: None,
            last_limit: CapacityLimit::None,
        }
    }

    /// Monitor with no disk bound, only an optional file ceiling
    pub fn without_volume() -> Self {
        Self {
            volume: None,
            byte_rate: 0,
            ceiling: None,
            last_limit: CapacityLimit::None,
        }
    }

    /// Clear the file ceiling and the last computed limit.
    pub fn reset(&mut self) {
        self.ceiling = None;
        self.last_limit = CapacityLimit::None;
    }

    pub fn set_byte_rate(&mut self, bytes_per_second: u64) {
        self.byte_rate = bytes_per_second;
    }

    /// Bound the recording to `max_bytes` in total for `file`.
    /// Whatever the file already holds counts against the budget.
    pub fn set_file_size_ceiling(&mut self, file: &Path, max_bytes: u64) {
        self.ceiling = Some(FileCeiling {
            path: file.to_path_buf(),
            max_bytes,
            start_offset: file_size(file),
        });
    }

    /// More than one block is free.
    pub fn disk_space_available(&self) -> bool {
        match &self.volume {
            Some(volume) => volume
                .stats()
                .map(|stats| stats.available_blocks > 1)
                .unwrap_or(false),
            None => true,
        }
    }

    /// Seconds of audio that still fit, or [`NO_LIMIT_SECS`].
    pub fn time_remaining(&mut self) -> u64 {
        if self.byte_rate == 0 {
            self.last_limit = CapacityLimit::None;
            return NO_LIMIT_SECS;
        }

        let free_bytes = self.volume.as_ref().map(|volume| match volume.stats() {
            Ok(stats) => stats.available_bytes(),
            Err(e) => {
                debug!("volume stats unavailable, treating as full: {}", e);
                0
            }
        });
        let file_bytes_left = self
            .ceiling
            .as_ref()
            .map(|c| c.max_bytes.saturating_sub(file_size(&c.path)));

        let (kind, secs) = binding_limit(
            free_bytes.map(|b| b / self.byte_rate),
            file_bytes_left.map(|b| b / self.byte_rate),
        );

        self.last_limit = match (kind, &self.ceiling) {
            (LimitKind::DiskSpace, _) => CapacityLimit::DiskSpace {
                free_bytes: free_bytes.unwrap_or(0),
            },
            (LimitKind::FileSize, Some(c)) => CapacityLimit::FileSize {
                ceiling_bytes: c.max_bytes,
                start_offset_bytes: c.start_offset,
            },
            _ => CapacityLimit::None,
        };
        secs
    }

    /// Which bound was binding in the last [`time_remaining`](Self::time_remaining) call
    pub fn current_lower_limit(&self) -> LimitKind {
        self.last_limit.kind()
    }

    pub fn current_limit(&self) -> CapacityLimit {
        self.last_limit
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
