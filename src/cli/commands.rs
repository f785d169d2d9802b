//! Session commands typed at the console or sent to the daemon

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::application::Preemption;

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Record,
    ConfirmOverwrite,
    CancelOverwrite,
    Stop,
    Play(f32),
    Pause,
    Delete,
    Rename(String),
    New,
    Finish,
    Back,
    Hide,
    Show,
    Preempt(Preemption),
    /// The call that preempted recording is over
    Hangup,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command \"{0}\". Type `help` for the list of commands")]
    Unknown(String),

    #[error("`{command}` {message}")]
    BadArgument {
        command: &'static str,
        message: String,
    },
}

pub const HELP: &str = "\
record            start recording into the current name
yes | no          answer the overwrite prompt
stop              stop recording or playback
play [fraction]   play the recording, optionally from 0.0..1.0 of its length
pause             pause playback
delete            delete the current recording
rename <name>     rename the current recording
new               keep the current recording and start a new one
finish            stop, keep the recording and exit
back              leave the session (a running recording continues)
hide | show       detach from or reattach to the recorder
preempt call|memory
                  simulate an interruption of the recording
hangup            end the call started by `preempt call`
status            show the session state
help              show this help
quit              stop, keep the recording and exit";

impl FromStr for SessionCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "" => return Err(CommandParseError::Empty),
            "record" | "rec" => Self::Record,
            "yes" | "y" => Self::ConfirmOverwrite,
            "no" | "n" => Self::CancelOverwrite,
            "stop" => Self::Stop,
            "play" => Self::Play(parse_fraction(rest)?),
            "pause" => Self::Pause,
            "delete" => Self::Delete,
            "rename" => {
                if rest.is_empty() {
                    return Err(CommandParseError::BadArgument {
                        command: "rename",
                        message: "needs a new name".to_string(),
                    });
                }
                Self::Rename(rest.to_string())
            }
            "new" => Self::New,
            "finish" => Self::Finish,
            "back" => Self::Back,
            "hide" => Self::Hide,
            "show" => Self::Show,
            "preempt" => Self::Preempt(match rest {
                "call" => Preemption::IncomingCall,
                "memory" => Preemption::LowMemory,
                other => {
                    return Err(CommandParseError::BadArgument {
                        command: "preempt",
                        message: format!("expects `call` or `memory`, got \"{}\"", other),
                    })
                }
            }),
            "hangup" => Self::Hangup,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_fraction(arg: &str) -> Result<f32, CommandParseError> {
    if arg.is_empty() {
        return Ok(0.0);
    }
    match arg.parse::<f32>() {
        Ok(f) if (0.0..=1.0).contains(&f) => Ok(f),
        _ => Err(CommandParseError::BadArgument {
            command: "play",
            message: format!("expects a fraction between 0 and 1, got \"{}\"", arg),
        }),
    }
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => f.write_str("record"),
            Self::ConfirmOverwrite => f.write_str("yes"),
            Self::CancelOverwrite => f.write_str("no"),
            Self::Stop => f.write_str("stop"),
            Self::Play(fraction) if *fraction > 0.0 => write!(f, "play {}", fraction),
            Self::Play(_) => f.write_str("play"),
            Self::Pause => f.write_str("pause"),
            Self::Delete => f.write_str("delete"),
            Self::Rename(name) => write!(f, "rename {}", name),
            Self::New => f.write_str("new"),
            Self::Finish => f.write_str("finish"),
            Self::Back => f.write_str("back"),
            Self::Hide => f.write_str("hide"),
            Self::Show => f.write_str("show"),
            Self::Preempt(cause) => write!(f, "preempt {}", cause.as_str()),
            Self::Hangup => f.write_str("hangup"),
            Self::Status => f.write_str("status"),
            Self::Help => f.write_str("help"),
            Self::Quit => f.write_str("quit"),
        }
    }
}
