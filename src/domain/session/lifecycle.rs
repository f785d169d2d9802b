//! Recording session entity

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use super::SessionState;

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: SessionState,
    pub action: String,
}

/// Recording session as seen by a controller.
///
/// State machine:
///   IDLE -> RECORDING (adopt_recording)
///   RECORDING -> IDLE (finish_recording)
///   IDLE | PAUSED -> PLAYING (start_playback)
///   PLAYING -> PAUSED (pause_playback)
///   PLAYING | PAUSED -> IDLE (stop_playback)
///
/// `sample_length_secs` is the committed length of the last finished
/// recording of `target_file`; it drops back to 0 whenever the target
/// changes or is discarded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
    target_file: Option<PathBuf>,
    started_at: Option<SystemTime>,
    sample_length_secs: u64,
}

impl Session {
    /// Create a new session in idle state with no target
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_file(&self) -> Option<&Path> {
        self.target_file.as_deref()
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn sample_length_secs(&self) -> u64 {
        self.sample_length_secs
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// A finished recording is available for playback or commit
    pub fn has_sample(&self) -> bool {
        self.sample_length_secs > 0
    }

    /// Point the idle session at the file the next recording will write.
    pub fn assign_target(&mut self, path: PathBuf) -> Result<(), InvalidStateTransition> {
        self.require(self.is_idle(), "choose a recording file")?;
        if self.target_file.as_ref() != Some(&path) {
            self.sample_length_secs = 0;
        }
        self.target_file = Some(path);
        Ok(())
    }

    /// Take over a recording the resource owner reports as running,
    /// replacing whatever was known locally.
    pub fn adopt_recording(&mut self, path: PathBuf, started_at: SystemTime) {
        self.state = SessionState::Recording;
        self.target_file = Some(path);
        self.started_at = Some(started_at);
        self.sample_length_secs = 0;
    }

    /// Transition from RECORDING to IDLE, committing the recorded length.
    /// A length of 0 leaves the file uncommitted.
    pub fn finish_recording(&mut self, length_secs: u64) -> Result<(), InvalidStateTransition> {
        self.require(self.is_recording(), "finish recording")?;
        self.state = SessionState::Idle;
        self.started_at = None;
        self.sample_length_secs = length_secs;
        Ok(())
    }

    /// Transition from IDLE or PAUSED to PLAYING
    pub fn start_playback(&mut self, now: SystemTime) -> Result<(), InvalidStateTransition> {
        match self.state {
            SessionState::Idle if self.target_file.is_some() => {
                self.started_at = Some(now);
            }
            SessionState::PlayingPaused => {}
            _ => return self.require(false, "start playback"),
        }
        self.state = SessionState::Playing;
        Ok(())
    }

    /// Transition from PLAYING to PAUSED
    pub fn pause_playback(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(self.state == SessionState::Playing, "pause playback")?;
        self.state = SessionState::PlayingPaused;
        Ok(())
    }

    /// Transition from PLAYING or PAUSED to IDLE
    pub fn stop_playback(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(self.state.is_playback(), "stop playback")?;
        self.state = SessionState::Idle;
        self.started_at = None;
        Ok(())
    }

    /// Move the target to a new path, keeping the committed length.
    /// Not allowed while the file is being written or read.
    pub fn rename_target(&mut self, path: PathBuf) -> Result<(), InvalidStateTransition> {
        let busy = matches!(self.state, SessionState::Recording | SessionState::Playing);
        self.require(!busy && self.target_file.is_some(), "rename recording")?;
        self.target_file = Some(path);
        Ok(())
    }

    /// Back to a fresh idle session. Returns the previous target, if any.
    pub fn discard(&mut self) -> Option<PathBuf> {
        self.state = SessionState::Idle;
        self.started_at = None;
        self.sample_length_secs = 0;
        self.target_file.take()
    }

    fn require(&self, allowed: bool, action: &str) -> Result<(), InvalidStateTransition> {
        if allowed {
            Ok(())
        } else {
            Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            })
        }
    }
}
