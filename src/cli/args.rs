//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::application::ControllerMode;
use crate::domain::config::AppConfig;
use crate::domain::recording::{ByteSize, Duration, OutputFormat, Quality};

/// Sound Recorder - record, play back and catalogue audio from the microphone
#[derive(Parser, Debug)]
#[command(name = "sound-recorder")]
#[command(version)]
#[command(about = "Record audio from the microphone into WAV or FLAC files")]
#[command(long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<FormatArg>,

    /// Record at the high sample rate
    #[arg(short = 'q', long)]
    pub high_quality: bool,

    /// Stop recording when the file reaches this size (e.g., 500k, 10MB)
    #[arg(short = 's', long, value_name = "SIZE")]
    pub max_file_size: Option<String>,

    /// Directory recordings are written to [env: SOUND_RECORDER_DIR]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Record exactly one clip, print its path and exit
    #[arg(short = 'm', long, conflicts_with = "daemon")]
    pub must_finish: bool,

    /// Show desktop notifications
    #[arg(short = 'n', long)]
    pub notify: bool,

    /// Run in the background (control via: sound-recorder daemon <command>)
    #[arg(long)]
    pub daemon: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Send a session command to the running daemon (e.g. `daemon record`)
    Daemon {
        /// Session command and its arguments
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Output format argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Wav,
    Flac,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => OutputFormat::Wav,
            FormatArg::Flac => OutputFormat::Flac,
        }
    }
}

/// Resolved session options, after merging config layers
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub recordings_dir: PathBuf,
    pub format: OutputFormat,
    pub quality: Quality,
    pub max_file_size: Option<ByteSize>,
    pub low_storage_threshold: Duration,
    pub mode: ControllerMode,
    pub notify: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = AppConfig::KEYS;

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::try_parse_from(["sound-recorder"]).unwrap();
        assert!(cli.format.is_none());
        assert!(!cli.high_quality);
        assert!(cli.max_file_size.is_none());
        assert!(!cli.must_finish);
        assert!(!cli.notify);
        assert!(!cli.daemon);
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_format_and_quality() {
        let cli = Cli::parse_from(["sound-recorder", "-f", "flac", "-q"]);
        assert_eq!(cli.format, Some(FormatArg::Flac));
        assert!(cli.high_quality);
        assert_eq!(OutputFormat::from(FormatArg::Flac), OutputFormat::Flac);
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["sound-recorder", "--format", "mp3"]).is_err());
    }

    #[test]
    fn cli_parses_max_file_size() {
        let cli = Cli::parse_from(["sound-recorder", "--max-file-size", "10MB"]);
        assert_eq!(cli.max_file_size, Some("10MB".to_string()));
    }

    #[test]
    fn must_finish_conflicts_with_daemon() {
        assert!(Cli::try_parse_from(["sound-recorder", "--must-finish", "--daemon"]).is_err());
    }

    #[test]
    fn cli_parses_daemon_command_with_arguments() {
        let cli = Cli::parse_from(["sound-recorder", "daemon", "rename", "band", "practice"]);
        match cli.command {
            Some(Commands::Daemon { command }) => {
                assert_eq!(command, vec!["rename", "band", "practice"]);
            }
            other => panic!("Expected Daemon command, got {:?}", other),
        }
    }

    #[test]
    fn daemon_command_is_required() {
        assert!(Cli::try_parse_from(["sound-recorder", "daemon"]).is_err());
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["sound-recorder", "config", "set", "format", "flac"]);
        if let Some(Commands::Config {
            action: ConfigAction::Set { key, value },
        }) = cli.command
        {
            assert_eq!(key, "format");
            assert_eq!(value, "flac");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("format"));
        assert!(is_valid_config_key("low_storage_threshold"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
