//! Console and daemon runners
//!
//! Both drive a [`SessionHost`] from one loop: commands arrive on a channel
//! (from stdin or the control socket), owner notifications and a periodic
//! tick keep the session current, and signals shut down, hide or show it.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::{timeout, MissedTickBehavior};

use crate::application::{ControllerMode, MONITOR_INTERVAL};

use super::app::{start_session, EXIT_ERROR, EXIT_NOTHING_COMMITTED, EXIT_SUCCESS};
use super::args::SessionOptions;
use super::commands::SessionCommand;
use super::pid_file::{PidFile, PidFileError};
use super::presenter::Presenter;
use super::session_host::{SessionHost, SessionRequest};
use super::signals::{SessionSignal, SignalHandler};
use super::socket::{DaemonSocketServer, SocketPath};

const REQUEST_QUEUE: usize = 16;
const OWNER_EXIT_WAIT: Duration = Duration::from_secs(2);

/// Where replies go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frontend {
    /// Printed, with a live status line
    Console,
    /// Sent back over the socket and logged
    Daemon,
}

/// Run an interactive session reading commands from stdin
pub async fn run_console(options: SessionOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut signals = match SignalHandler::new() {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (tx, mut rx) = mpsc::channel(REQUEST_QUEUE);
    if let Err(e) = spawn_stdin_reader(tx) {
        presenter.error(&format!("Failed to read commands: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }
    let (owner_task, mut host) = start_session(&options);

    presenter.info(&format!(
        "Recording {} into {}. Type `help` for commands",
        options.format,
        options.recordings_dir.display()
    ));

    serve(&mut host, &mut rx, &mut signals, &mut presenter, Frontend::Console).await;
    presenter.stop_spinner();

    let code = match (options.mode, host.committed_path()) {
        (ControllerMode::MustFinish, Some(path)) => {
            presenter.output(&path.display().to_string());
            EXIT_SUCCESS
        }
        (ControllerMode::MustFinish, None) => {
            presenter.warn("No recording was kept");
            EXIT_NOTHING_COMMITTED
        }
        (ControllerMode::Standalone, _) => EXIT_SUCCESS,
    };

    finish_owner(host, owner_task).await;
    ExitCode::from(code)
}

/// Run daemon mode: commands arrive on the control socket
pub async fn run_daemon(options: SessionOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut pid_file = PidFile::new();
    if let Err(e) = pid_file.acquire() {
        match e {
            PidFileError::AlreadyRunning(pid) => {
                presenter.error(&format!("Another daemon is already running (PID: {})", pid));
            }
            _ => presenter.error(&e.to_string()),
        }
        return ExitCode::from(EXIT_ERROR);
    }

    let mut signals = match SignalHandler::new() {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let socket_path = SocketPath::new();
    let mut socket_server = DaemonSocketServer::new(socket_path.clone());
    if let Err(e) = socket_server.bind() {
        presenter.error(&format!("Failed to bind socket: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let (owner_task, mut host) = start_session(&options);
    let (tx, mut rx) = mpsc::channel(REQUEST_QUEUE);
    let server_task = tokio::spawn(async move {
        if let Err(e) = socket_server.run(tx).await {
            warn!("socket server stopped: {}", e);
        }
    });

    presenter.daemon_status("Started, waiting for commands...");
    presenter.info(&format!(
        "PID: {} | Socket: {} | Recordings: {} | SIGUSR1: hide, SIGUSR2: show",
        std::process::id(),
        socket_path.path().display(),
        options.recordings_dir.display()
    ));

    serve(&mut host, &mut rx, &mut signals, &mut presenter, Frontend::Daemon).await;

    // Dropping the server removes the socket file.
    server_task.abort();
    let _ = server_task.await;
    finish_owner(host, owner_task).await;
    let _ = pid_file.release();

    presenter.daemon_status("Stopped");
    ExitCode::from(EXIT_SUCCESS)
}

/// Session loop shared by both runners. Returns once the session is over;
/// by then anything running has been stopped and committed.
async fn serve(
    host: &mut SessionHost,
    requests: &mut mpsc::Receiver<SessionRequest>,
    signals: &mut SignalHandler,
    presenter: &mut Presenter,
    frontend: Frontend,
) {
    let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let mut exit = false;
        tokio::select! {
            request = requests.recv() => match request {
                Some(SessionRequest { command, reply }) => {
                    let response = host.execute(command).await;
                    exit = response.exit;
                    match reply {
                        Some(reply) => {
                            info!("replied: {}", response.to_wire().trim_end());
                            let _ = reply.send(response);
                        }
                        None => presenter.reply(&response),
                    }
                }
                None => break,
            },
            Some(event) = host.next_event() => host.on_event(event),
            _ = ticker.tick() => host.tick(),
            Some(signal) = signals.recv() => match signal {
                SessionSignal::Shutdown => break,
                SessionSignal::Hide => presenter.reply(&host.hide().await),
                SessionSignal::Show => presenter.reply(&host.show()),
            },
        }

        if let Some(advisory) = host.take_advisory() {
            match frontend {
                Frontend::Console => presenter.reply(&advisory),
                Frontend::Daemon => warn!("{}", advisory.message),
            }
        }
        if frontend == Frontend::Console {
            match host.view() {
                Some(view) => presenter.show_session(&view),
                None => presenter.stop_spinner(),
            }
        }
        if exit || host.is_finished() {
            break;
        }
    }

    presenter.stop_spinner();
    host.shutdown().await;
}

/// Forward stdin lines as session requests. End of input quits.
///
/// A pending stdin read cannot be cancelled, so this runs outside the runtime.
fn spawn_stdin_reader(tx: mpsc::Sender<SessionRequest>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let presenter = Presenter::new();
            let mut lines = io::stdin().lock().lines();
            loop {
                let command = match lines.next() {
                    Some(Ok(line)) if line.trim().is_empty() => continue,
                    Some(Ok(line)) => match line.parse::<SessionCommand>() {
                        Ok(command) => command,
                        Err(e) => {
                            presenter.error(&e.to_string());
                            continue;
                        }
                    },
                    None => SessionCommand::Quit,
                    Some(Err(e)) => {
                        warn!("cannot read stdin: {}", e);
                        SessionCommand::Quit
                    }
                };
                let quit = command == SessionCommand::Quit;
                let request = SessionRequest {
                    command,
                    reply: None,
                };
                if tx.blocking_send(request).is_err() || quit {
                    break;
                }
            }
        })?;
    Ok(())
}

/// Drop the last handle so the owner task ends, and give it a moment to do so.
async fn finish_owner(host: SessionHost, owner_task: tokio::task::JoinHandle<()>) {
    drop(host);
    if timeout(OWNER_EXIT_WAIT, owner_task).await.is_err() {
        warn!("resource owner did not stop in time");
    }
}
