//! Host environment port interfaces

use thiserror::Error;

/// Wake lock errors
#[derive(Debug, Clone, Error)]
pub enum WakeLockError {
    #[error("No sleep inhibitor available on this system")]
    Unavailable,

    #[error("Failed to inhibit sleep: {0}")]
    Failed(String),
}

/// Port for facts about the host the recorder runs on
pub trait HostEnvironment: Send + Sync {
    /// A voice call currently holds the audio path
    fn in_call(&self) -> bool;
}

/// Port keeping the host awake while a recording runs.
///
/// The resource owner calls `acquire` once per recording and `release`
/// once on every exit path.
pub trait WakeLock: Send {
    fn acquire(&mut self) -> Result<(), WakeLockError>;

    fn release(&mut self);
}
