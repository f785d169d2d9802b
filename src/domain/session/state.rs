//! Session state

use std::fmt;

/// Recording-session states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Playing,
    PlayingPaused,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Playing => "playing",
            Self::PlayingPaused => "paused",
        }
    }

    /// Playing or paused in the middle of playback
    pub const fn is_playback(&self) -> bool {
        matches!(self, Self::Playing | Self::PlayingPaused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Recording.to_string(), "recording");
        assert_eq!(SessionState::Playing.to_string(), "playing");
        assert_eq!(SessionState::PlayingPaused.to_string(), "paused");
    }

    #[test]
    fn playback_states() {
        assert!(SessionState::Playing.is_playback());
        assert!(SessionState::PlayingPaused.is_playback());
        assert!(!SessionState::Recording.is_playback());
        assert!(!SessionState::Idle.is_playback());
    }
}
