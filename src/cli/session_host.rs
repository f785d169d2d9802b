//! One recorder session behind a line-oriented command interface
//!
//! The host owns at most one [`SessionController`] at a time. Hiding drops
//! the controller while the resource owner carries on; showing attaches a
//! fresh one that reconciles with whatever the owner is doing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::oneshot;

use crate::application::ports::{
    AudioPlayer, CatalogSink, Clock, HostEnvironment, StorageVolume,
};
use crate::application::{
    BackOutcome, CommandOutcome, ControllerConfig, ControllerMode, ControllerPorts, Preemption,
    RecorderEvent, ResourceOwnerHandle, SessionController, SessionView,
};
use crate::domain::session::SessionState;
use crate::infrastructure::host::DesktopHost;

use super::commands::{SessionCommand, HELP};
use super::presenter::{format_clock, format_status};

/// Builds a fresh player for each attached controller
pub type PlayerFactory = Box<dyn Fn() -> Box<dyn AudioPlayer> + Send + Sync>;

/// How long shutdown waits for the owner to finish writing
const STOP_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Info,
    Success,
    Warning,
    Error,
}

impl ReplyKind {
    const fn wire_tag(&self) -> &'static str {
        match self {
            Self::Info | Self::Success => "ok",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

/// Answer to one session command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub message: String,
    /// The session is over and the process should exit
    pub exit: bool,
}

impl Reply {
    fn new(kind: ReplyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            exit: false,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ReplyKind::Error, message)
    }

    fn exiting(mut self) -> Self {
        self.exit = true;
        self
    }

    /// Encode for the control socket: `<ok|warn|error>: <message>`.
    /// The message may span several lines.
    pub fn to_wire(&self) -> String {
        format!("{}: {}\n", self.kind.wire_tag(), self.message)
    }

    /// Decode a socket response written by [`Reply::to_wire`].
    pub fn from_wire(response: &str) -> Self {
        let response = response.trim_end();
        let (kind, message) = match response.split_once(':') {
            Some(("ok", rest)) => (ReplyKind::Info, rest),
            Some(("warn", rest)) => (ReplyKind::Warning, rest),
            Some(("error", rest)) => (ReplyKind::Error, rest),
            _ => (ReplyKind::Error, response),
        };
        let message = message.strip_prefix(' ').unwrap_or(message);
        Self::new(kind, message)
    }
}

/// A command waiting for the session loop, with an optional return path
/// for the reply. Replies without one are printed by the loop.
#[derive(Debug)]
pub struct SessionRequest {
    pub command: SessionCommand,
    pub reply: Option<oneshot::Sender<Reply>>,
}

/// Collaborators shared by every controller the host attaches
pub struct HostPorts {
    pub volume: Arc<dyn StorageVolume>,
    pub catalog: Arc<dyn CatalogSink>,
    pub clock: Arc<dyn Clock>,
    pub new_player: PlayerFactory,
    /// Call state shared with the resource owner
    pub desktop: Arc<DesktopHost>,
}

pub struct SessionHost {
    owner: ResourceOwnerHandle,
    ports: HostPorts,
    config: ControllerConfig,
    controller: Option<SessionController<Box<dyn AudioPlayer>>>,
    committed: Option<PathBuf>,
}

impl SessionHost {
    /// Create the host with a controller attached.
    pub fn new(owner: ResourceOwnerHandle, ports: HostPorts, config: ControllerConfig) -> Self {
        let mut host = Self {
            owner,
            ports,
            config,
            controller: None,
            committed: None,
        };
        host.attach();
        host
    }

    pub fn mode(&self) -> ControllerMode {
        self.config.mode
    }

    pub fn is_attached(&self) -> bool {
        self.controller.is_some()
    }

    /// Snapshot of the attached session
    pub fn view(&self) -> Option<SessionView> {
        self.controller.as_ref().map(|c| c.view())
    }

    /// The controller finished; the process should exit
    pub fn is_finished(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_finished())
    }

    /// Path of the last recording committed to the catalog
    pub fn committed_path(&self) -> Option<&Path> {
        self.committed.as_deref()
    }

    /// Wait for the next owner notification. Pending while hidden.
    pub async fn next_event(&mut self) -> Option<RecorderEvent> {
        match self.controller.as_mut() {
            Some(controller) => controller.next_event().await,
            None => std::future::pending().await,
        }
    }

    pub fn on_event(&mut self, event: RecorderEvent) {
        if let Some(controller) = self.controller.as_mut() {
            controller.on_notification(event);
        }
    }

    pub fn tick(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.tick();
        }
    }

    /// Advisory raised since the last call, as a reply to print
    pub fn take_advisory(&mut self) -> Option<Reply> {
        let advisory = self.controller.as_mut()?.take_advisory()?;
        Some(Reply::warning(advisory.to_string()))
    }

    pub async fn execute(&mut self, command: SessionCommand) -> Reply {
        debug!("session command: {}", command);
        let reply = match command {
            SessionCommand::Help => Reply::info(HELP),
            SessionCommand::Status => self.status(),
            SessionCommand::Hide => self.hide().await,
            SessionCommand::Show => self.show(),
            SessionCommand::Preempt(cause) => {
                if cause == Preemption::IncomingCall {
                    self.ports.desktop.set_in_call(true);
                }
                self.owner.signal_preemption(cause);
                Reply::info(format!("Signalled {}", cause))
            }
            SessionCommand::Hangup => {
                if self.ports.desktop.in_call() {
                    self.ports.desktop.set_in_call(false);
                    Reply::info("Call ended")
                } else {
                    Reply::info("No call in progress")
                }
            }
            SessionCommand::Quit => {
                self.shutdown().await;
                Reply::success(self.farewell()).exiting()
            }
            SessionCommand::Back => self.back().await,
            command => self.drive(command).await,
        };
        self.remember_committed();
        reply
    }

    /// Detach the controller. A standalone recording keeps running.
    pub async fn hide(&mut self) -> Reply {
        let Some(mut controller) = self.controller.take() else {
            return Reply::info("Already hidden");
        };
        controller.on_hidden().await;
        self.note_committed(&controller);
        if controller.state() == SessionState::Recording {
            Reply::info("Hidden. Recording continues in the background")
        } else {
            Reply::info("Hidden")
        }
    }

    /// Attach a controller if none is attached.
    pub fn show(&mut self) -> Reply {
        if self.controller.is_none() {
            self.attach();
        }
        match self.controller.as_mut() {
            Some(controller) => {
                controller.on_visible();
                let view = controller.view();
                Reply::info(format!("{} ({})", view.name, view.state))
            }
            None => Reply::error("Could not attach to the recorder"),
        }
    }

    /// Stop anything running, commit it, and wait for the file to be closed.
    pub async fn shutdown(&mut self) {
        if self.controller.is_none() && self.owner.is_recording() {
            // Adopt the background recording so it is committed.
            self.attach();
        }
        if let Some(controller) = self.controller.as_mut() {
            controller.close().await;
        }
        self.remember_committed();

        let deadline = tokio::time::Instant::now() + STOP_WAIT;
        while self.owner.is_recording() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn attach(&mut self) {
        let ports = ControllerPorts {
            player: (self.ports.new_player)(),
            volume: Arc::clone(&self.ports.volume),
            catalog: Arc::clone(&self.ports.catalog),
            clock: Arc::clone(&self.ports.clock),
        };
        self.controller = Some(SessionController::attach(
            self.owner.clone(),
            ports,
            self.config.clone(),
        ));
    }

    async fn drive(&mut self, command: SessionCommand) -> Reply {
        let Some(controller) = self.controller.as_mut() else {
            return Reply::warning("Session is hidden. Use `show` first");
        };
        let before = controller.view();

        let outcome = match &command {
            SessionCommand::Record => controller.start_recording().await,
            SessionCommand::ConfirmOverwrite => controller.confirm_overwrite(),
            SessionCommand::CancelOverwrite => {
                if before.awaiting_confirmation.is_none() {
                    return Reply::warning("Nothing to answer");
                }
                controller.cancel_overwrite();
                return Reply::info("Kept the existing file");
            }
            SessionCommand::Stop => controller.stop().await,
            SessionCommand::Play(fraction) => controller.start_playback(*fraction).await,
            SessionCommand::Pause => controller.pause_playback().await,
            SessionCommand::Delete => controller.delete_current().await,
            SessionCommand::Rename(name) => {
                return if controller.rename_current(name) {
                    Reply::success(format!("Renamed to {}", controller.name()))
                } else {
                    Reply::error(format!("Cannot rename to \"{}\"", name))
                };
            }
            SessionCommand::New => controller.new_session().await,
            SessionCommand::Finish => controller.finish().await,
            other => return Reply::error(format!("`{}` is not a session command", other)),
        };

        let verb = command.to_string();
        match outcome {
            CommandOutcome::Accepted => {
                if controller.is_finished() {
                    let reply = match controller.committed_path() {
                        Some(path) => Reply::success(format!("Saved {}", path.display())),
                        None => Reply::warning("Finished without a recording"),
                    };
                    return reply.exiting();
                }
                accepted_reply(&command, &before, &controller.view())
            }
            CommandOutcome::Debounced => {
                Reply::warning(format!("`{}` ignored: too soon after the previous command", verb))
            }
            CommandOutcome::Ignored => {
                Reply::warning(format!("Nothing to {} while {}", verb, before.state))
            }
            CommandOutcome::Rejected(advisory) => {
                controller.take_advisory();
                Reply::error(advisory.to_string())
            }
            CommandOutcome::NeedsConfirmation(path) => Reply::warning(format!(
                "{} already exists. Overwrite? (yes/no)",
                path.display()
            )),
        }
    }

    async fn back(&mut self) -> Reply {
        let Some(controller) = self.controller.as_mut() else {
            return Reply::warning("Session is hidden");
        };
        let was_recording = controller.state() == SessionState::Recording;
        match controller.back().await {
            BackOutcome::Stay if was_recording => Reply::info("Recording discarded"),
            BackOutcome::Stay => Reply::info("Playback stopped"),
            BackOutcome::Close if self.config.mode == ControllerMode::MustFinish => {
                self.remember_committed();
                Reply::info("Closed").exiting()
            }
            BackOutcome::Close => {
                let mut reply = self.hide().await;
                reply.message.push_str(". Use `show` to return");
                reply
            }
        }
    }

    fn status(&self) -> Reply {
        match self.controller.as_ref() {
            Some(controller) => Reply::info(format_status(&controller.view())),
            None => {
                let status = self.owner.status();
                let mut lines = vec!["state: hidden".to_string()];
                if let (true, Some(path)) = (status.recording, status.file_path) {
                    lines.push(format!("recording: {}", path.display()));
                }
                Reply::info(lines.join("\n"))
            }
        }
    }

    fn farewell(&self) -> String {
        match self.committed.as_ref() {
            Some(path) => format!("Saved {}", path.display()),
            None => "Bye".to_string(),
        }
    }

    fn remember_committed(&mut self) {
        if let Some(path) = self
            .controller
            .as_ref()
            .and_then(|c| c.committed_path())
            .map(Path::to_path_buf)
        {
            self.committed = Some(path);
        }
    }

    fn note_committed(&mut self, controller: &SessionController<Box<dyn AudioPlayer>>) {
        if let Some(path) = controller.committed_path() {
            self.committed = Some(path.to_path_buf());
        }
    }
}

fn accepted_reply(command: &SessionCommand, before: &SessionView, after: &SessionView) -> Reply {
    match command {
        SessionCommand::Record | SessionCommand::ConfirmOverwrite => {
            match after.target_file.as_ref() {
                Some(path) => Reply::success(format!("Recording to {}", path.display())),
                None => Reply::success("Recording"),
            }
        }
        SessionCommand::Stop if before.state == SessionState::Recording => Reply::success(
            format!("Stopped {} ({})", after.name, format_clock(after.sample_length_secs)),
        ),
        SessionCommand::Stop => Reply::info("Stopped"),
        SessionCommand::Play(_) => Reply::info(format!("Playing {}", after.name)),
        SessionCommand::Pause => Reply::info("Paused"),
        SessionCommand::Delete => Reply::success(format!("Deleted {}", before.name)),
        SessionCommand::New => Reply::success(format!("New recording {}", after.name)),
        other => Reply::info(format!("{}: done", other)),
    }
}
