//! Foreground session controller
//!
//! A controller is what a user interface drives. It can be created and
//! destroyed at any time; the recording itself lives in the
//! [`ResourceOwner`](super::ResourceOwner). Whenever the two may have drifted
//! apart (on attach, when shown again, on every notification) the controller
//! reconciles its local [`Session`] against the owner's status.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};

use super::broadcast::{RecorderEvent, Subscription};
use super::capacity::CapacityMonitor;
use super::ports::{AudioPlayer, CatalogEntry, CatalogId, CatalogSink, Clock, StorageVolume};
use super::resource_owner::{ResourceOwnerHandle, StartRequest};
use crate::domain::capacity::{LimitKind, DEFAULT_LOW_STORAGE_THRESHOLD_SECS, NO_LIMIT_SECS};
use crate::domain::error::ErrorCode;
use crate::domain::recording::{
    byte_rate, sample_length_secs, OutputFormat, Quality, SampleName,
};
use crate::domain::session::{
    Advisory, CommandGuard, Control, InvalidStateTransition, Session, SessionState,
};

/// How the controller was launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerMode {
    /// Free-running recorder
    #[default]
    Standalone,
    /// Embedded by a caller that expects exactly one committed recording
    MustFinish,
}

/// Controller settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub recordings_dir: PathBuf,
    pub format: OutputFormat,
    pub quality: Quality,
    /// File-size ceiling in bytes
    pub max_file_size: Option<u64>,
    pub mode: ControllerMode,
    pub low_storage_threshold_secs: u64,
}

impl ControllerConfig {
    pub fn new(recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            recordings_dir: recordings_dir.into(),
            format: OutputFormat::default(),
            quality: Quality::default(),
            max_file_size: None,
            mode: ControllerMode::default(),
            low_storage_threshold_secs: DEFAULT_LOW_STORAGE_THRESHOLD_SECS,
        }
    }
}

/// Collaborators owned by one controller
pub struct ControllerPorts<P> {
    pub player: P,
    pub volume: Arc<dyn StorageVolume>,
    pub catalog: Arc<dyn CatalogSink>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    /// Dropped as too soon after, or a repeat of, the previous command
    Debounced,
    /// Not applicable in the current state
    Ignored,
    /// Refused; the advisory is also kept for display
    Rejected(Advisory),
    /// The target file exists. Answer with `confirm_overwrite` or `cancel_overwrite`.
    NeedsConfirmation(PathBuf),
}

/// What the user interface should do after a back/cancel action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Stay,
    Close,
}

/// Render snapshot of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub name: String,
    pub target_file: Option<PathBuf>,
    pub elapsed_secs: u64,
    pub sample_length_secs: u64,
    /// Seconds of recording left, when a bound applies
    pub remaining_secs: Option<u64>,
    pub low_storage: bool,
    pub peak_amplitude: u32,
    pub play_fraction: f32,
    pub advisory: Option<Advisory>,
    pub awaiting_confirmation: Option<PathBuf>,
}

pub struct SessionController<P: AudioPlayer> {
    owner: ResourceOwnerHandle,
    events: Subscription,
    player: P,
    volume: Arc<dyn StorageVolume>,
    catalog: Arc<dyn CatalogSink>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
    session: Session,
    name: SampleName,
    guard: CommandGuard,
    monitor: CapacityMonitor,
    advisory: Option<Advisory>,
    remaining_secs: Option<u64>,
    low_storage: bool,
    /// Set between a start request and the owner confirming it
    start_requested_at: Option<SystemTime>,
    pending_overwrite: Option<PathBuf>,
    saved: HashSet<PathBuf>,
    committed: Option<CatalogId>,
    committed_path: Option<PathBuf>,
    volume_ready: bool,
    visible: bool,
    finished: bool,
}

impl<P: AudioPlayer> SessionController<P> {
    /// Subscribe to the owner and reconcile with whatever it is doing.
    pub fn attach(
        owner: ResourceOwnerHandle,
        ports: ControllerPorts<P>,
        config: ControllerConfig,
    ) -> Self {
        let events = owner.subscribe();
        let name = SampleName::generate(DateTime::<Local>::from(ports.clock.now()));
        let volume_ready = ports.volume.is_ready();

        let mut controller = Self {
            owner,
            events,
            player: ports.player,
            monitor: CapacityMonitor::new(Arc::clone(&ports.volume)),
            volume: ports.volume,
            catalog: ports.catalog,
            clock: ports.clock,
            config,
            session: Session::new(),
            name,
            guard: CommandGuard::new(),
            advisory: None,
            remaining_secs: None,
            low_storage: false,
            start_requested_at: None,
            pending_overwrite: None,
            saved: HashSet::new(),
            committed: None,
            committed_path: None,
            volume_ready,
            visible: true,
            finished: false,
        };
        controller.reconcile();
        controller
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn name(&self) -> &SampleName {
        &self.name
    }

    pub fn mode(&self) -> ControllerMode {
        self.config.mode
    }

    pub fn format(&self) -> OutputFormat {
        self.config.format
    }

    /// Catalog id of the last committed recording
    pub fn committed(&self) -> Option<&CatalogId> {
        self.committed.as_ref()
    }

    /// File behind [`Self::committed`]
    pub fn committed_path(&self) -> Option<&Path> {
        self.committed_path.as_deref()
    }

    /// `finish` has run; the user interface should close
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn advisory(&self) -> Option<Advisory> {
        self.advisory
    }

    /// Take the advisory so it is shown only once
    pub fn take_advisory(&mut self) -> Option<Advisory> {
        self.advisory.take()
    }

    /// Wait for the next owner notification
    pub async fn next_event(&mut self) -> Option<RecorderEvent> {
        self.events.recv().await
    }

    /// Bring the local session in line with the resource owner.
    ///
    /// Running this twice in a row has the same effect as running it once.
    pub fn reconcile(&mut self) {
        let status = self.owner.status();

        if status.recording {
            let (Some(path), Some(started_at)) = (status.file_path, status.started_at) else {
                return;
            };
            if !self.config.format.matches(&path) {
                info!(
                    "recording {} does not match the {} format, starting over",
                    path.display(),
                    self.config.format
                );
                self.reset();
                return;
            }
            let already_adopted = self.session.is_recording()
                && self.session.target_file() == Some(path.as_path())
                && self.session.started_at() == Some(started_at);
            if !already_adopted {
                debug!("adopting recording {}", path.display());
                self.stop_playback_now();
                if let Some(name) = SampleName::from_path(&path) {
                    self.name = name;
                }
                self.configure_monitor(&path);
                self.session.adopt_recording(path, started_at);
            }
            self.start_requested_at = None;
            return;
        }

        if self.session.is_recording() {
            let length = status
                .last_completed
                .as_ref()
                .filter(|c| Some(c.path.as_path()) == self.session.target_file())
                .map_or(0, |c| c.length_secs);
            log_transition(self.session.finish_recording(length));
            self.clear_capacity();
        } else if let Some(requested_at) = self.start_requested_at {
            // The owner started and stopped before we saw it recording.
            let completed = status.last_completed.filter(|c| {
                c.started_at >= requested_at && Some(c.path.as_path()) == self.session.target_file()
            });
            if let Some(completed) = completed {
                self.start_requested_at = None;
                self.session
                    .adopt_recording(completed.path, completed.started_at);
                log_transition(self.session.finish_recording(completed.length_secs));
            }
        }

        if let Some(target) = self.session.target_file() {
            if !self.config.format.matches(target) || !target.exists() {
                debug!("{} is gone or stale, starting over", target.display());
                self.reset();
                return;
            }
        }
        self.release_guard_if_idle();
    }

    /// Apply an owner notification, then reconcile.
    pub fn on_notification(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::StateChanged { is_recording } => {
                if is_recording {
                    self.advisory = None;
                }
            }
            RecorderEvent::Error(code) => {
                debug!("owner reported: {}", code);
                self.advisory = Some(Advisory::Error(code));
                let start_failed = self.start_requested_at.take().is_some()
                    && self.session.is_idle()
                    && !self.session.has_sample();
                if start_failed {
                    // Nothing was written past the placeholder.
                    if let Some(path) = self.session.discard() {
                        remove_recording(&path);
                    }
                }
                self.guard.forget_control();
            }
        }
        self.reconcile();
    }

    /// Commit the current sample and start over with a fresh name.
    /// In must-finish mode this finishes instead.
    pub async fn new_session(&mut self) -> CommandOutcome {
        if self.config.mode == ControllerMode::MustFinish {
            return self.finish().await;
        }
        if !self.admit(Control::New) {
            return CommandOutcome::Debounced;
        }
        self.save_sample().await;
        self.reset();
        CommandOutcome::Accepted
    }

    /// Start recording into `<recordings dir>/<name><ext>`.
    pub async fn start_recording(&mut self) -> CommandOutcome {
        if !self.admit(Control::Record) {
            return CommandOutcome::Debounced;
        }
        if !self.session.is_idle() || self.session.has_sample() {
            return CommandOutcome::Ignored;
        }

        let path = self
            .name
            .file_in(&self.config.recordings_dir, self.config.format);
        if self.config.mode == ControllerMode::Standalone && path.exists() {
            self.pending_overwrite = Some(path.clone());
            return CommandOutcome::NeedsConfirmation(path);
        }
        self.begin_recording(path)
    }

    /// Go ahead with a recording that will overwrite an existing file.
    pub fn confirm_overwrite(&mut self) -> CommandOutcome {
        match self.pending_overwrite.take() {
            Some(path) => self.begin_recording(path),
            None => CommandOutcome::Ignored,
        }
    }

    pub fn cancel_overwrite(&mut self) {
        self.pending_overwrite = None;
        self.guard.forget_control();
    }

    /// Stop recording or playback.
    pub async fn stop(&mut self) -> CommandOutcome {
        if !self.admit(Control::Stop) {
            return CommandOutcome::Debounced;
        }
        self.stop_now();
        CommandOutcome::Accepted
    }

    /// Play the current recording from `from_fraction` (0.0..=1.0) of its length.
    pub async fn start_playback(&mut self, from_fraction: f32) -> CommandOutcome {
        if !self.admit(Control::Play) {
            return CommandOutcome::Debounced;
        }
        let fraction = if from_fraction.is_finite() {
            from_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let result = match self.session.state() {
            SessionState::PlayingPaused => self
                .player
                .seek(fraction)
                .and_then(|()| self.player.start()),
            SessionState::Idle if self.session.has_sample() => {
                let Some(path) = self.session.target_file().map(Path::to_path_buf) else {
                    return CommandOutcome::Ignored;
                };
                self.player.stop();
                self.player
                    .load(&path)
                    .and_then(|()| self.player.seek(fraction))
                    .and_then(|()| self.player.start())
            }
            _ => return CommandOutcome::Ignored,
        };

        if let Err(e) = result {
            warn!("playback failed: {}", e);
            self.player.stop();
            log_transition(self.session.stop_playback());
            let code = if e.is_storage() {
                ErrorCode::StorageAccess
            } else {
                ErrorCode::Internal
            };
            return self.reject(Advisory::Error(code));
        }

        log_transition(self.session.start_playback(self.clock.now()));
        CommandOutcome::Accepted
    }

    pub async fn pause_playback(&mut self) -> CommandOutcome {
        if !self.admit(Control::Pause) {
            return CommandOutcome::Debounced;
        }
        if self.session.state() != SessionState::Playing {
            return CommandOutcome::Ignored;
        }
        if let Err(e) = self.player.pause() {
            warn!("could not pause playback: {}", e);
        }
        log_transition(self.session.pause_playback());
        CommandOutcome::Accepted
    }

    /// Delete the current recording file. Not available while recording.
    pub async fn delete_current(&mut self) -> CommandOutcome {
        if !self.admit(Control::Delete) {
            return CommandOutcome::Debounced;
        }
        if self.session.is_recording() || self.session.target_file().is_none() {
            return CommandOutcome::Ignored;
        }

        self.stop_playback_now();
        if let Some(path) = self.session.discard() {
            remove_recording(&path);
            self.saved.remove(&path);
        }
        CommandOutcome::Accepted
    }

    /// Rename the current recording, or set the name of the next one.
    ///
    /// Returns false when the rename was not applied: the name is invalid,
    /// the file is being recorded or played, or the new name is taken.
    pub fn rename_current(&mut self, name: &str) -> bool {
        let Ok(name) = name.parse::<SampleName>() else {
            debug!("rejected recording name {:?}", name);
            return false;
        };
        if matches!(
            self.session.state(),
            SessionState::Recording | SessionState::Playing
        ) {
            return false;
        }

        let Some(current) = self.session.target_file().map(Path::to_path_buf) else {
            self.name = name;
            return true;
        };
        let format = OutputFormat::from_path(&current).unwrap_or(self.config.format);
        let dir = current
            .parent()
            .map_or_else(|| self.config.recordings_dir.clone(), Path::to_path_buf);
        let renamed = name.file_in(&dir, format);

        if renamed == current {
            self.name = name;
            return true;
        }
        if renamed.exists() {
            debug!("not renaming onto existing {}", renamed.display());
            return false;
        }
        match fs::rename(&current, &renamed) {
            Ok(()) => {
                log_transition(self.session.rename_target(renamed));
                self.name = name;
                true
            }
            Err(e) => {
                debug!("rename of {} failed: {}", current.display(), e);
                false
            }
        }
    }

    /// Stop, commit what was captured and mark the controller finished.
    pub async fn finish(&mut self) -> CommandOutcome {
        if !self.admit(Control::Finish) {
            return CommandOutcome::Debounced;
        }
        self.stop_now();
        self.save_sample().await;
        self.finished = true;
        CommandOutcome::Accepted
    }

    /// Stop whatever is running and commit the sample, without debouncing.
    /// Used when the hosting process exits.
    pub async fn close(&mut self) {
        self.stop_now();
        self.save_sample().await;
    }

    /// Back/cancel action.
    pub async fn back(&mut self) -> BackOutcome {
        match self.session.state() {
            SessionState::Idle | SessionState::PlayingPaused => {
                self.stop_playback_now();
                self.save_sample().await;
                BackOutcome::Close
            }
            SessionState::Playing => {
                self.stop_now();
                self.save_sample().await;
                BackOutcome::Stay
            }
            SessionState::Recording => match self.config.mode {
                ControllerMode::MustFinish => {
                    self.owner.request_stop();
                    self.start_requested_at = None;
                    if let Some(path) = self.session.discard() {
                        remove_recording(&path);
                    }
                    self.clear_capacity();
                    BackOutcome::Stay
                }
                ControllerMode::Standalone => BackOutcome::Close,
            },
        }
    }

    /// Commit the current sample and start over if the format changes.
    pub async fn set_requested_format(&mut self, format: OutputFormat) {
        if format == self.config.format {
            return;
        }
        self.save_sample().await;
        self.reset();
        self.config.format = format;
    }

    /// The user interface went away.
    ///
    /// A standalone recording without a size ceiling keeps running in the
    /// background and the owner takes over capacity monitoring. Anything
    /// else is stopped and committed.
    pub async fn on_hidden(&mut self) {
        self.visible = false;
        let keep_recording = self.session.is_recording()
            && self.config.mode == ControllerMode::Standalone
            && self.config.max_file_size.is_none();
        if !keep_recording {
            self.stop_now();
            self.save_sample().await;
        }
        if self.owner.is_recording() || self.start_requested_at.is_some() {
            self.owner.request_enable_monitoring();
        }
    }

    /// The user interface is showing again.
    pub fn on_visible(&mut self) {
        self.visible = true;
        self.reconcile();
        if self.owner.is_recording() || self.start_requested_at.is_some() {
            self.owner.request_disable_monitoring();
        }
    }

    /// Periodic refresh: storage mount changes, capacity while recording,
    /// playback completion.
    pub fn tick(&mut self) {
        let ready = self.volume.is_ready();
        if ready != self.volume_ready {
            self.volume_ready = ready;
            info!(
                "storage {}, resetting session",
                if ready { "mounted" } else { "unmounted" }
            );
            self.reset();
            return;
        }

        match self.session.state() {
            SessionState::Recording if self.visible => self.poll_capacity(),
            SessionState::Playing if self.player.is_finished() => {
                self.player.stop();
                log_transition(self.session.stop_playback());
                self.guard.forget_control();
            }
            _ => {}
        }
    }

    pub fn view(&self) -> SessionView {
        let state = self.session.state();
        let elapsed_secs = match state {
            SessionState::Recording => self
                .session
                .started_at()
                .and_then(|t| self.clock.now().duration_since(t).ok())
                .map_or(0, |d| d.as_secs()),
            SessionState::Playing | SessionState::PlayingPaused => {
                self.player.position_secs().max(0.0) as u64
            }
            SessionState::Idle => 0,
        };
        let duration = self.player.duration_secs();
        let play_fraction = if state.is_playback() && duration > 0.0 {
            (self.player.position_secs() / duration).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        let recording = state == SessionState::Recording;

        SessionView {
            state,
            name: self.name.to_string(),
            target_file: self.session.target_file().map(Path::to_path_buf),
            elapsed_secs,
            sample_length_secs: self.session.sample_length_secs(),
            remaining_secs: if recording { self.remaining_secs } else { None },
            low_storage: recording && (self.low_storage || self.owner.low_storage_advisory()),
            peak_amplitude: if recording {
                self.owner.peak_amplitude()
            } else {
                0
            },
            play_fraction,
            advisory: self.advisory,
            awaiting_confirmation: self.pending_overwrite.clone(),
        }
    }

    fn begin_recording(&mut self, path: PathBuf) -> CommandOutcome {
        self.monitor.reset();
        if !self.volume.is_ready() {
            return self.reject(Advisory::StorageNotReady);
        }
        if !self.monitor.disk_space_available() {
            return self.reject(Advisory::StorageFull);
        }

        self.stop_playback_now();
        if let Err(e) = create_target(&path) {
            warn!("cannot create {}: {}", path.display(), e);
            return self.reject(Advisory::Error(ErrorCode::StorageAccess));
        }
        if self.session.assign_target(path.clone()).is_err() {
            return CommandOutcome::Ignored;
        }

        self.configure_monitor(&path);
        self.advisory = None;
        self.start_requested_at = Some(self.clock.now());
        self.owner.request_start(StartRequest {
            format: self.config.format,
            quality: self.config.quality,
            path,
            max_file_size: self.config.max_file_size,
        });
        CommandOutcome::Accepted
    }

    fn stop_now(&mut self) {
        let owner_busy = self.owner.is_recording() || self.start_requested_at.is_some();
        if self.session.is_recording() || owner_busy {
            self.owner.request_stop();
        }
        if self.session.is_recording() {
            let elapsed = self
                .session
                .started_at()
                .and_then(|t| self.clock.now().duration_since(t).ok())
                .unwrap_or_default();
            log_transition(self.session.finish_recording(sample_length_secs(elapsed)));
            self.clear_capacity();
        }
        self.stop_playback_now();
        self.release_guard_if_idle();
    }

    fn stop_playback_now(&mut self) {
        if self.session.state().is_playback() {
            self.player.stop();
            log_transition(self.session.stop_playback());
        }
    }

    /// Back to a fresh idle session with a new default name.
    fn reset(&mut self) {
        if self.session.is_recording()
            || self.owner.is_recording()
            || self.start_requested_at.is_some()
        {
            self.owner.request_stop();
        }
        self.player.stop();
        self.session.discard();
        self.start_requested_at = None;
        self.pending_overwrite = None;
        self.clear_capacity();
        self.name = SampleName::generate(DateTime::<Local>::from(self.clock.now()));
        self.guard.forget_control();
    }

    /// Hand the current sample to the catalog, once per file.
    async fn save_sample(&mut self) -> Option<CatalogId> {
        if !self.session.has_sample() {
            return None;
        }
        let path = self.session.target_file()?.to_path_buf();
        if self.saved.contains(&path) {
            return None;
        }

        let now = self.clock.now();
        let entry = CatalogEntry {
            title: DateTime::<Local>::from(now)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            mime_type: OutputFormat::from_path(&path)
                .unwrap_or(self.config.format)
                .mime_type()
                .to_string(),
            duration_secs: self.session.sample_length_secs(),
            date_added: DateTime::<Utc>::from(now),
            date_modified: fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from),
            path: path.clone(),
        };

        match self.catalog.insert(entry).await {
            Ok(id) => {
                info!("catalogued {} as {}", path.display(), id);
                self.saved.insert(path.clone());
                self.committed = Some(id.clone());
                self.committed_path = Some(path);
                Some(id)
            }
            Err(e) => {
                warn!("could not catalogue {}: {}", path.display(), e);
                None
            }
        }
    }

    fn poll_capacity(&mut self) {
        let remaining = self.monitor.time_remaining();
        let limit = self.monitor.current_lower_limit();

        if remaining == 0 {
            self.advisory = Some(Advisory::stopped_by(limit));
            self.stop_now();
            return;
        }
        self.remaining_secs = (remaining != NO_LIMIT_SECS).then_some(remaining);
        self.low_storage = remaining <= self.config.low_storage_threshold_secs
            && limit == LimitKind::DiskSpace;
    }

    fn configure_monitor(&mut self, path: &Path) {
        self.monitor.reset();
        self.monitor.set_byte_rate(byte_rate(self.config.quality));
        if let Some(max_bytes) = self.config.max_file_size {
            self.monitor.set_file_size_ceiling(path, max_bytes);
        }
    }

    fn clear_capacity(&mut self) {
        self.monitor.reset();
        self.remaining_secs = None;
        self.low_storage = false;
    }

    fn admit(&mut self, control: Control) -> bool {
        let admitted = self.guard.admit(control, self.clock.now());
        if !admitted {
            debug!("{} ignored: too soon or repeated", control.as_str());
        }
        admitted
    }

    fn reject(&mut self, advisory: Advisory) -> CommandOutcome {
        self.advisory = Some(advisory);
        self.guard.forget_control();
        CommandOutcome::Rejected(advisory)
    }

    /// An idle session with nothing pending takes any control again.
    fn release_guard_if_idle(&mut self) {
        if self.session.is_idle()
            && self.start_requested_at.is_none()
            && self.pending_overwrite.is_none()
        {
            self.guard.forget_control();
        }
    }
}

fn log_transition(result: Result<(), InvalidStateTransition>) {
    if let Err(e) = result {
        debug!("{}", e);
    }
}

fn remove_recording(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("deleted {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not delete {}: {}", path.display(), e),
    }
}

fn create_target(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{EncoderError, PlaybackError};
    use crate::application::resource_owner::{OwnerConfig, OwnerPorts, ResourceOwner};
    use crate::application::test_support::{
        EncoderLog, FakeEncoder, FakeHost, FakePlayer, FakeVolume, FakeWakeLock, ManualClock,
        MemoryCatalog, PlayerLog, RecordingNotifier,
    };
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Fixture {
        handle: ResourceOwnerHandle,
        encoder: Arc<Mutex<EncoderLog>>,
        clock: Arc<ManualClock>,
        volume: Arc<FakeVolume>,
        catalog: Arc<MemoryCatalog>,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let (encoder, log) = FakeEncoder::new();
            let (wake_lock, _) = FakeWakeLock::new();
            let clock = ManualClock::new();
            let volume = FakeVolume::new(dir.path());

            let (owner, handle) = ResourceOwner::new(
                OwnerPorts {
                    encoder,
                    wake_lock,
                    volume: volume.clone(),
                    host: Arc::new(FakeHost::default()),
                    notifier: Arc::new(RecordingNotifier::default()),
                    clock: clock.clone(),
                },
                OwnerConfig::default(),
            );
            tokio::spawn(owner.run());

            Self {
                handle,
                encoder: log,
                clock,
                volume,
                catalog: Arc::new(MemoryCatalog::default()),
                dir,
            }
        }

        fn config(&self) -> ControllerConfig {
            ControllerConfig::new(self.dir.path())
        }

        fn attach(&self) -> (SessionController<FakePlayer>, Arc<Mutex<PlayerLog>>) {
            self.attach_with(self.config())
        }

        fn attach_with(
            &self,
            config: ControllerConfig,
        ) -> (SessionController<FakePlayer>, Arc<Mutex<PlayerLog>>) {
            let (player, log) = FakePlayer::new();
            let controller = SessionController::attach(
                self.handle.clone(),
                ControllerPorts {
                    player,
                    volume: self.volume.clone(),
                    catalog: self.catalog.clone(),
                    clock: self.clock.clone(),
                },
                config,
            );
            (controller, log)
        }

        fn advance_ms(&self, ms: u64) {
            self.clock.advance(Duration::from_millis(ms));
        }
    }

    /// Apply every notification that arrives within a short quiet period.
    async fn pump(controller: &mut SessionController<FakePlayer>) {
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(100), controller.next_event()).await
        {
            controller.on_notification(event);
        }
    }

    async fn record(fx: &Fixture, controller: &mut SessionController<FakePlayer>) -> PathBuf {
        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        pump(controller).await;
        assert_eq!(controller.state(), SessionState::Recording);
        fx.advance_ms(2600);
        controller.session().target_file().unwrap().to_path_buf()
    }

    #[tokio::test]
    async fn record_and_stop_commits_rounded_length() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();

        let path = record(&fx, &mut controller).await;
        assert!(path.starts_with(fx.dir.path()));
        assert_eq!(controller.stop().await, CommandOutcome::Accepted);
        pump(&mut controller).await;

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.session().sample_length_secs(), 3);
        assert!(!fx.handle.is_recording());
        assert_eq!(fx.encoder.lock().unwrap().stops, 1);
    }

    #[tokio::test]
    async fn stop_right_after_start_is_debounced() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        pump(&mut controller).await;
        fx.advance_ms(500);
        assert_eq!(controller.stop().await, CommandOutcome::Debounced);
        assert_eq!(controller.state(), SessionState::Recording);

        fx.advance_ms(1000);
        assert_eq!(controller.stop().await, CommandOutcome::Accepted);
        fx.advance_ms(1000);
        assert_eq!(controller.stop().await, CommandOutcome::Debounced);
    }

    #[tokio::test]
    async fn existing_file_asks_before_overwriting() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let existing = controller.name().file_in(fx.dir.path(), OutputFormat::Wav);
        fs::write(&existing, b"old take").unwrap();

        assert_eq!(
            controller.start_recording().await,
            CommandOutcome::NeedsConfirmation(existing.clone())
        );
        assert_eq!(controller.view().awaiting_confirmation, Some(existing.clone()));

        assert_eq!(controller.confirm_overwrite(), CommandOutcome::Accepted);
        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Recording);
        assert_eq!(fx.handle.current_file_path(), Some(existing));
    }

    #[tokio::test]
    async fn must_finish_overwrites_without_asking() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.mode = ControllerMode::MustFinish;
        let (mut controller, _) = fx.attach_with(config);
        let existing = controller.name().file_in(fx.dir.path(), OutputFormat::Wav);
        fs::write(&existing, b"old take").unwrap();

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
    }

    #[tokio::test]
    async fn cancelled_overwrite_allows_record_again() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let existing = controller.name().file_in(fx.dir.path(), OutputFormat::Wav);
        fs::write(&existing, b"old take").unwrap();

        assert!(matches!(
            controller.start_recording().await,
            CommandOutcome::NeedsConfirmation(_)
        ));
        controller.cancel_overwrite();
        assert_eq!(controller.confirm_overwrite(), CommandOutcome::Ignored);

        fx.advance_ms(400);
        assert!(matches!(
            controller.start_recording().await,
            CommandOutcome::NeedsConfirmation(_)
        ));
    }

    #[tokio::test]
    async fn reattached_controller_adopts_running_recording() {
        let fx = Fixture::new();
        let (mut first, _) = fx.attach();
        let path = record(&fx, &mut first).await;
        let started_at = fx.handle.started_at();

        first.on_hidden().await;
        drop(first);
        assert!(fx.handle.is_recording());

        let (mut second, _) = fx.attach();
        assert_eq!(second.state(), SessionState::Recording);
        assert_eq!(second.session().target_file(), Some(path.as_path()));
        assert_eq!(second.session().started_at(), started_at);
        assert_eq!(second.name(), &SampleName::from_path(&path).unwrap());

        second.reconcile();
        assert_eq!(second.state(), SessionState::Recording);

        assert_eq!(second.stop().await, CommandOutcome::Accepted);
        pump(&mut second).await;
        assert_eq!(second.session().sample_length_secs(), 3);
    }

    #[tokio::test]
    async fn recording_stopped_while_visible_elsewhere_is_finished_locally() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let path = record(&fx, &mut controller).await;

        fx.handle.request_stop();
        pump(&mut controller).await;

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.session().target_file(), Some(path.as_path()));
        assert_eq!(controller.session().sample_length_secs(), 3);
    }

    #[tokio::test]
    async fn hidden_must_finish_recording_is_stopped_and_committed() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.mode = ControllerMode::MustFinish;
        let (mut controller, _) = fx.attach_with(config);
        record(&fx, &mut controller).await;

        controller.on_hidden().await;
        pump(&mut controller).await;

        assert!(!fx.handle.is_recording());
        assert_eq!(fx.catalog.entries.lock().unwrap().len(), 1);
        assert!(controller.committed().is_some());
    }

    #[tokio::test]
    async fn close_commits_running_recording_without_debounce() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let path = record(&fx, &mut controller).await;

        assert_eq!(controller.pause_playback().await, CommandOutcome::Ignored);
        assert_eq!(controller.stop().await, CommandOutcome::Debounced);
        controller.close().await;
        pump(&mut controller).await;

        assert!(!fx.handle.is_recording());
        assert_eq!(controller.committed_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn hidden_standalone_recording_hands_monitoring_to_owner() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;

        controller.on_hidden().await;
        pump(&mut controller).await;
        assert!(fx.handle.is_recording());
        assert!(fx.handle.status().monitoring);

        controller.on_visible();
        pump(&mut controller).await;
        assert!(!fx.handle.status().monitoring);
        assert_eq!(controller.state(), SessionState::Recording);
    }

    #[tokio::test]
    async fn sample_is_catalogued_once() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let path = record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;

        assert_eq!(controller.back().await, BackOutcome::Close);
        assert_eq!(controller.back().await, BackOutcome::Close);

        let entries = fx.catalog.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, path);
        assert_eq!(entries[0].duration_secs, 3);
        assert_eq!(entries[0].mime_type, OutputFormat::Wav.mime_type());
    }

    #[tokio::test]
    async fn catalog_failure_leaves_sample_uncommitted() {
        let fx = Fixture::new();
        fx.catalog.fail.store(true, Ordering::SeqCst);
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;

        fx.advance_ms(400);
        assert_eq!(controller.finish().await, CommandOutcome::Accepted);
        assert!(controller.is_finished());
        assert!(controller.committed().is_none());
    }

    #[tokio::test]
    async fn new_session_commits_and_picks_fresh_name() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;
        let first_name = controller.name().clone();
        controller.stop().await;
        pump(&mut controller).await;

        fx.advance_ms(1000);
        assert_eq!(controller.new_session().await, CommandOutcome::Accepted);
        assert_eq!(fx.catalog.entries.lock().unwrap().len(), 1);
        assert_eq!(controller.session().target_file(), None);
        assert_ne!(controller.name(), &first_name);
    }

    #[tokio::test]
    async fn rename_moves_file_but_not_while_recording() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let path = record(&fx, &mut controller).await;

        assert!(!controller.rename_current("take-two"));

        controller.stop().await;
        pump(&mut controller).await;
        assert!(!controller.rename_current("bad/name"));
        assert!(controller.rename_current("take-two"));

        let renamed = fx.dir.path().join("take-two.wav");
        assert_eq!(controller.session().target_file(), Some(renamed.as_path()));
        assert!(renamed.exists());
        assert!(!path.exists());
        assert_eq!(controller.session().sample_length_secs(), 3);
    }

    #[tokio::test]
    async fn rename_onto_existing_file_is_refused() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;
        fs::write(fx.dir.path().join("taken.wav"), b"x").unwrap();

        assert!(!controller.rename_current("taken"));
    }

    #[tokio::test]
    async fn playback_seeks_pauses_and_finishes() {
        let fx = Fixture::new();
        let (mut controller, player) = fx.attach();
        let path = record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;

        fx.advance_ms(400);
        assert_eq!(controller.start_playback(0.5).await, CommandOutcome::Accepted);
        assert_eq!(controller.state(), SessionState::Playing);
        {
            let log = player.lock().unwrap();
            assert_eq!(log.loaded, Some(path));
            assert_eq!(log.seeks, vec![0.5]);
        }
        assert!((controller.view().play_fraction - 0.5).abs() < f32::EPSILON);

        fx.advance_ms(400);
        assert_eq!(controller.pause_playback().await, CommandOutcome::Accepted);
        assert_eq!(controller.state(), SessionState::PlayingPaused);

        fx.advance_ms(400);
        assert_eq!(controller.start_playback(7.0).await, CommandOutcome::Accepted);
        assert_eq!(player.lock().unwrap().seeks, vec![0.5, 1.0]);

        player.lock().unwrap().finished = true;
        controller.tick();
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.session().has_sample());
    }

    #[tokio::test]
    async fn unreadable_sample_rejects_playback() {
        let fx = Fixture::new();
        let (mut controller, player) = fx.attach();
        record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;

        player.lock().unwrap().fail_load = Some(PlaybackError::Storage("gone".into()));
        fx.advance_ms(400);
        assert_eq!(
            controller.start_playback(0.0).await,
            CommandOutcome::Rejected(Advisory::Error(ErrorCode::StorageAccess))
        );
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn delete_removes_file_and_target() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        let path = record(&fx, &mut controller).await;

        assert_eq!(controller.delete_current().await, CommandOutcome::Ignored);
        fx.advance_ms(2000);
        controller.stop().await;
        pump(&mut controller).await;

        fx.advance_ms(400);
        assert_eq!(controller.delete_current().await, CommandOutcome::Accepted);
        assert!(!path.exists());
        assert_eq!(controller.session().target_file(), None);
    }

    #[tokio::test]
    async fn unmounted_storage_rejects_recording() {
        let fx = Fixture::new();
        fx.volume.set_ready(false);
        let (mut controller, _) = fx.attach();

        assert_eq!(
            controller.start_recording().await,
            CommandOutcome::Rejected(Advisory::StorageNotReady)
        );
        assert_eq!(controller.take_advisory(), Some(Advisory::StorageNotReady));
        assert_eq!(controller.take_advisory(), None);
    }

    #[tokio::test]
    async fn full_storage_rejects_recording() {
        let fx = Fixture::new();
        fx.volume.set_free_blocks(1);
        let (mut controller, _) = fx.attach();

        assert_eq!(
            controller.start_recording().await,
            CommandOutcome::Rejected(Advisory::StorageFull)
        );
        assert!(!fx.handle.is_recording());
    }

    #[tokio::test]
    async fn volume_change_resets_session() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;

        fx.volume.set_ready(false);
        controller.tick();
        pump(&mut controller).await;

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.session().target_file(), None);
        assert!(!fx.handle.is_recording());
    }

    #[tokio::test]
    async fn reaching_file_ceiling_stops_with_advisory() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.max_file_size = Some(32_044);
        let (mut controller, _) = fx.attach_with(config);
        let path = record(&fx, &mut controller).await;

        controller.tick();
        assert_eq!(controller.view().remaining_secs, Some(1));
        assert!(!controller.view().low_storage);

        fs::write(&path, vec![0u8; 32_044]).unwrap();
        controller.tick();
        pump(&mut controller).await;

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(
            controller.advisory(),
            Some(Advisory::Error(ErrorCode::CapacityExhausted(
                LimitKind::FileSize
            )))
        );
        assert!(!fx.handle.is_recording());
    }

    #[tokio::test]
    async fn low_disk_raises_low_storage_flag() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;

        // ten minutes at 32000 bytes per second, in 4096-byte blocks
        fx.volume.set_free_blocks(10 * 60 * 32_000 / 4096);
        controller.tick();

        let view = controller.view();
        assert!(view.low_storage);
        assert!(view.remaining_secs.unwrap() <= 600);
    }

    #[tokio::test]
    async fn owner_failure_surfaces_as_advisory() {
        let fx = Fixture::new();
        fx.encoder.lock().unwrap().fail_start = Some(EncoderError::Storage("denied".into()));
        let (mut controller, _) = fx.attach();

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        pump(&mut controller).await;

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(
            controller.advisory(),
            Some(Advisory::Error(ErrorCode::StorageAccess))
        );
    }

    #[tokio::test]
    async fn record_is_available_again_after_rejection() {
        let fx = Fixture::new();
        fx.volume.set_ready(false);
        let (mut controller, _) = fx.attach();

        assert_eq!(
            controller.start_recording().await,
            CommandOutcome::Rejected(Advisory::StorageNotReady)
        );
        fx.volume.set_ready(true);
        fx.advance_ms(5_000);

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Recording);
    }

    #[tokio::test]
    async fn record_is_available_again_after_failed_start() {
        let fx = Fixture::new();
        fx.encoder.lock().unwrap().fail_start = Some(EncoderError::Device("busy".into()));
        let (mut controller, _) = fx.attach();

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        let placeholder = controller.session().target_file().unwrap().to_path_buf();
        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!placeholder.exists());

        fx.advance_ms(5_000);
        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Recording);
        assert_eq!(fx.handle.current_file_path(), Some(placeholder));
    }

    #[tokio::test]
    async fn recording_that_ended_before_any_notification_is_kept() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();

        assert_eq!(controller.start_recording().await, CommandOutcome::Accepted);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fx.handle.is_recording());
        fx.advance_ms(2600);
        fx.handle.request_stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.session().sample_length_secs(), 3);
        assert!(controller.session().target_file().is_some());
    }

    #[tokio::test]
    async fn must_finish_back_abandons_recording() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.mode = ControllerMode::MustFinish;
        let (mut controller, _) = fx.attach_with(config);
        let path = record(&fx, &mut controller).await;

        assert_eq!(controller.back().await, BackOutcome::Stay);
        pump(&mut controller).await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!controller.session().has_sample());
        assert!(!path.exists());
        assert!(!fx.handle.is_recording());

        assert_eq!(controller.back().await, BackOutcome::Close);
        assert!(fx.catalog.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn must_finish_new_session_finishes() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.mode = ControllerMode::MustFinish;
        let (mut controller, _) = fx.attach_with(config);
        record(&fx, &mut controller).await;

        assert_eq!(controller.new_session().await, CommandOutcome::Accepted);
        pump(&mut controller).await;
        assert!(controller.is_finished());
        assert_eq!(controller.committed(), Some(&CatalogId("1".to_string())));
    }

    #[tokio::test]
    async fn format_change_starts_over() {
        let fx = Fixture::new();
        let (mut controller, _) = fx.attach();
        record(&fx, &mut controller).await;
        controller.stop().await;
        pump(&mut controller).await;

        controller.set_requested_format(OutputFormat::Flac).await;
        assert_eq!(controller.format(), OutputFormat::Flac);
        assert_eq!(controller.session().target_file(), None);
        assert_eq!(fx.catalog.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_running_format_is_not_adopted() {
        let fx = Fixture::new();
        let (mut first, _) = fx.attach();
        record(&fx, &mut first).await;
        first.on_hidden().await;
        drop(first);

        let mut config = fx.config();
        config.format = OutputFormat::Flac;
        let (mut second, _) = fx.attach_with(config);
        pump(&mut second).await;

        assert_eq!(second.state(), SessionState::Idle);
        assert!(!fx.handle.is_recording());
    }
}
