//! Domain error types

use thiserror::Error;

use crate::domain::capacity::LimitKind;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>h, <number>m, <number>s or a combination (e.g., 30s, 30m, 1h30m)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when parsing a byte size string
#[derive(Debug, Clone, Error)]
#[error("Invalid size: \"{input}\". Expected a positive number with an optional unit (e.g., 4096, 500k, 10MB, 1g)")]
pub struct ByteSizeParseError {
    pub input: String,
}

/// Error when an unknown output format is requested
#[derive(Debug, Clone, Error)]
#[error("Invalid format: \"{input}\". Valid formats are: wav, flac")]
pub struct FormatParseError {
    pub input: String,
}

/// Error when a recording name cannot be used as a file name
#[derive(Debug, Clone, Error)]
#[error("Invalid recording name: \"{input}\". Names must be non-empty and must not contain path separators")]
pub struct InvalidSampleName {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Failure codes carried by recorder notifications.
///
/// Hardware and I/O failures are classified into one of these before they
/// leave the resource owner, so controllers never see raw encoder errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("Cannot access storage")]
    StorageAccess,

    #[error("Internal application error")]
    Internal,

    #[error("Recording is not possible during a call")]
    InCallRecord,

    #[error("Recording stopped: {0}")]
    CapacityExhausted(LimitKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_exhausted_message_names_the_limit() {
        assert_eq!(
            ErrorCode::CapacityExhausted(LimitKind::DiskSpace).to_string(),
            "Recording stopped: storage full"
        );
        assert_eq!(
            ErrorCode::CapacityExhausted(LimitKind::FileSize).to_string(),
            "Recording stopped: length limit reached"
        );
    }

    #[test]
    fn parse_errors_echo_input() {
        let err = ByteSizeParseError {
            input: "12zz".to_string(),
        };
        assert!(err.to_string().contains("12zz"));

        let err = FormatParseError {
            input: "mp3".to_string(),
        };
        assert!(err.to_string().contains("mp3"));
        assert!(err.to_string().contains("flac"));
    }
}
