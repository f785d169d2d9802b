//! User-facing advisories raised by the session controller

use std::fmt;

use crate::domain::capacity::LimitKind;
use crate::domain::error::ErrorCode;

/// Message a controller surfaces to the user after a rejected or
/// interrupted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// The storage volume is not mounted or not writable
    StorageNotReady,
    /// Not enough free space to start a recording
    StorageFull,
    /// A recording stopped without a more specific reason
    RecordingStopped,
    /// A failure reported by the resource owner or detected locally
    Error(ErrorCode),
}

impl Advisory {
    /// Advisory for a recording stopped by the given bound
    pub fn stopped_by(limit: LimitKind) -> Self {
        match limit {
            LimitKind::None => Self::RecordingStopped,
            limit => Self::Error(ErrorCode::CapacityExhausted(limit)),
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageNotReady => f.write_str("Storage is not available"),
            Self::StorageFull => f.write_str("Storage is full"),
            Self::RecordingStopped => f.write_str("Recording stopped"),
            Self::Error(code) => write!(f, "{}", code),
        }
    }
}
