//! Sound Recorder CLI entry point

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use sound_recorder::application::ControllerMode;
use sound_recorder::cli::{
    app::{load_merged_config, resolve_options, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    daemon_cmd::handle_daemon_command,
    presenter::Presenter,
    session_app::{run_console, run_daemon},
};
use sound_recorder::domain::config::AppConfig;
use sound_recorder::domain::recording::OutputFormat;
use sound_recorder::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let presenter = Presenter::new();

    // Handle subcommands
    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Some(Commands::Daemon { command }) => {
            if let Err(e) = handle_daemon_command(&command, &presenter).await {
                presenter.error(&e);
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        None => {}
    }

    // Build CLI config from args
    let cli_config = AppConfig {
        format: cli.format.map(|f| OutputFormat::from(f).to_string()),
        high_quality: if cli.high_quality { Some(true) } else { None },
        max_file_size: cli.max_file_size.clone(),
        recordings_dir: cli
            .dir
            .as_ref()
            .map(|d| d.to_string_lossy().to_string()),
        low_storage_threshold: None,
        notify: if cli.notify { Some(true) } else { None },
    };

    let config = load_merged_config(cli_config).await;
    let mode = if cli.must_finish {
        ControllerMode::MustFinish
    } else {
        ControllerMode::Standalone
    };

    let options = match resolve_options(&config, mode) {
        Ok(options) => options,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    if cli.daemon {
        run_daemon(options).await
    } else {
        run_console(options).await
    }
}
