//! Command debouncing

use std::time::{Duration, SystemTime};

/// Minimum spacing between any two accepted commands
pub const MIN_COMMAND_INTERVAL: Duration = Duration::from_millis(300);

/// Minimum spacing before a stop is accepted
pub const STOP_COMMAND_INTERVAL: Duration = Duration::from_millis(1500);

/// User controls that issue session commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    New,
    Record,
    Stop,
    Play,
    Pause,
    Delete,
    Finish,
}

impl Control {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Record => "record",
            Self::Stop => "stop",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Delete => "delete",
            Self::Finish => "finish",
        }
    }
}

/// Filters rapid or repeated commands.
///
/// A command is dropped when it arrives less than [`MIN_COMMAND_INTERVAL`]
/// after the last accepted one, when it repeats the last accepted control
/// (except [`Control::New`]), or when it is a stop arriving less than
/// [`STOP_COMMAND_INTERVAL`] after the last accepted command.
#[derive(Debug, Default, Clone)]
pub struct CommandGuard {
    last_at: Option<SystemTime>,
    last_control: Option<Control>,
}

impl CommandGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `control` may run at `now`, recording it if so.
    pub fn admit(&mut self, control: Control, now: SystemTime) -> bool {
        if let Some(last_at) = self.last_at {
            // A clock that moved backwards counts as no time elapsed.
            let since = now.duration_since(last_at).unwrap_or(Duration::ZERO);
            if since < MIN_COMMAND_INTERVAL {
                return false;
            }
            if control == Control::Stop && since < STOP_COMMAND_INTERVAL {
                return false;
            }
        }
        if control != Control::New && self.last_control == Some(control) {
            return false;
        }

        self.last_at = Some(now);
        self.last_control = Some(control);
        true
    }

    /// Allow the last control to be pressed again, e.g. after a prompt
    /// was cancelled or the session went back to idle.
    pub fn forget_control(&mut self) {
        self.last_control = None;
    }
}
