//! Recording capacity limits

use std::fmt;

/// Returned by capacity queries when no bound is configured.
pub const NO_LIMIT_SECS: u64 = u64::MAX;

/// Default remaining-time threshold for the low-storage advisory (30 minutes)
pub const DEFAULT_LOW_STORAGE_THRESHOLD_SECS: u64 = 30 * 60;

/// Which bound is closest to exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LimitKind {
    #[default]
    None,
    DiskSpace,
    FileSize,
}

impl LimitKind {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DiskSpace => "disk-space",
            Self::FileSize => "file-size",
        }
    }

    /// Message shown when a recording is stopped by this limit
    pub const fn stop_reason(&self) -> &'static str {
        match self {
            Self::None => "recording stopped",
            Self::DiskSpace => "storage full",
            Self::FileSize => "length limit reached",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stop_reason())
    }
}

/// The bound currently governing a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityLimit {
    #[default]
    None,
    DiskSpace {
        free_bytes: u64,
    },
    FileSize {
        ceiling_bytes: u64,
        start_offset_bytes: u64,
    },
}

impl CapacityLimit {
    pub const fn kind(&self) -> LimitKind {
        match self {
            Self::None => LimitKind::None,
            Self::DiskSpace { .. } => LimitKind::DiskSpace,
            Self::FileSize { .. } => LimitKind::FileSize,
        }
    }
}

/// Pick the tighter of two optional bounds, in seconds.
///
/// Equal bounds resolve to [`LimitKind::FileSize`].
pub fn binding_limit(disk_secs: Option<u64>, file_secs: Option<u64>) -> (LimitKind, u64) {
    match (disk_secs, file_secs) {
        (None, None) => (LimitKind::None, NO_LIMIT_SECS),
        (Some(disk), None) => (LimitKind::DiskSpace, disk),
        (None, Some(file)) => (LimitKind::FileSize, file),
        (Some(disk), Some(file)) if disk < file => (LimitKind::DiskSpace, disk),
        (Some(_), Some(file)) => (LimitKind::FileSize, file),
    }
}
