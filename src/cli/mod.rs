//! CLI layer - Command-line interface
//!
//! Contains argument parsing, the session command grammar, output
//! formatting, signal handling, and the console and daemon runners.

pub mod app;
pub mod args;
pub mod commands;
pub mod config_cmd;
pub mod daemon_cmd;
pub mod pid_file;
pub mod presenter;
pub mod session_app;
pub mod session_host;
pub mod signals;
pub mod socket;

// Re-export commonly used types
pub use app::{
    load_merged_config, resolve_options, start_session, EXIT_ERROR, EXIT_NOTHING_COMMITTED,
    EXIT_SUCCESS, EXIT_USAGE_ERROR,
};
pub use args::{Cli, Commands, ConfigAction, SessionOptions};
pub use commands::SessionCommand;
pub use daemon_cmd::handle_daemon_command;
pub use presenter::Presenter;
pub use session_app::{run_console, run_daemon};
pub use session_host::{HostPorts, Reply, ReplyKind, SessionHost};
