//! Audio playback port interface

use std::path::Path;

use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Cannot read recording: {0}")]
    Storage(String),

    #[error("Unsupported or corrupt audio file: {0}")]
    Decode(String),

    #[error("Audio output error: {0}")]
    Device(String),

    #[error("Nothing is loaded for playback")]
    NotLoaded,
}

impl PlaybackError {
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Port for playing back a recorded file.
///
/// Completion is observed by polling [`AudioPlayer::is_finished`].
pub trait AudioPlayer: Send {
    /// Load a file, paused at its beginning.
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError>;

    fn start(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Jump to a fraction (0.0..=1.0) of the loaded file's duration.
    fn seek(&mut self, fraction: f32) -> Result<(), PlaybackError>;

    /// Stop and unload. Safe to call when nothing is loaded.
    fn stop(&mut self);

    fn position_secs(&self) -> f64;

    /// Duration of the loaded file, 0 when unknown
    fn duration_secs(&self) -> f64;

    /// The loaded file has played to its end
    fn is_finished(&self) -> bool;
}

impl AudioPlayer for Box<dyn AudioPlayer> {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.as_mut().load(path)
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        self.as_mut().start()
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.as_mut().pause()
    }

    fn seek(&mut self, fraction: f32) -> Result<(), PlaybackError> {
        self.as_mut().seek(fraction)
    }

    fn stop(&mut self) {
        self.as_mut().stop()
    }

    fn position_secs(&self) -> f64 {
        self.as_ref().position_secs()
    }

    fn duration_secs(&self) -> f64 {
        self.as_ref().duration_secs()
    }

    fn is_finished(&self) -> bool {
        self.as_ref().is_finished()
    }
}
