//! Background owner of the microphone/encoder resource
//!
//! The owner runs as its own task and outlives any controller. Controllers
//! talk to it through a cloneable [`ResourceOwnerHandle`]: commands are
//! fire-and-forget, status is read from a shared snapshot, and state
//! changes are announced on the [`NotificationChannel`].

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::broadcast::{NotificationChannel, RecorderEvent, Subscription};
use super::capacity::CapacityMonitor;
use super::ports::{
    AmplitudeGauge, AudioEncoder, Clock, EncoderError, EncoderFault, FaultReporter,
    HostEnvironment, NotificationIcon, Notifier, StorageVolume, WakeLock,
};
use crate::domain::capacity::{LimitKind, DEFAULT_LOW_STORAGE_THRESHOLD_SECS};
use crate::domain::error::ErrorCode;
use crate::domain::recording::{sample_length_secs, EncoderSettings, OutputFormat, Quality};

/// Capacity polling period while monitoring is enabled
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

const NOTIFICATION_TITLE: &str = "Sound Recorder";

/// Parameters of a recording to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub format: OutputFormat,
    pub quality: Quality,
    pub path: PathBuf,
    /// File-size ceiling in bytes
    pub max_file_size: Option<u64>,
}

/// External events that end a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preemption {
    IncomingCall,
    LowMemory,
}

impl Preemption {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IncomingCall => "call",
            Self::LowMemory => "memory",
        }
    }
}

impl fmt::Display for Preemption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncomingCall => f.write_str("incoming call"),
            Self::LowMemory => f.write_str("low memory"),
        }
    }
}

/// Commands accepted by the owner task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerCommand {
    Start(StartRequest),
    Stop,
    EnableMonitoring,
    DisableMonitoring,
    Preempt(Preemption),
}

/// A recording the owner finished and committed a length for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecording {
    pub path: PathBuf,
    pub started_at: SystemTime,
    pub length_secs: u64,
}

/// Snapshot of the owner's state, readable from any thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerStatus {
    pub recording: bool,
    pub started_at: Option<SystemTime>,
    pub file_path: Option<PathBuf>,
    pub last_completed: Option<CompletedRecording>,
    pub monitoring: bool,
    pub low_storage_advisory: bool,
}

/// Owner tuning
#[derive(Debug, Clone)]
pub struct OwnerConfig {
    /// Remaining seconds below which the low-storage advisory is raised
    pub low_storage_threshold_secs: u64,
    pub monitor_interval: Duration,
    /// Whether to show desktop notifications
    pub enable_notify: bool,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            low_storage_threshold_secs: DEFAULT_LOW_STORAGE_THRESHOLD_SECS,
            monitor_interval: MONITOR_INTERVAL,
            enable_notify: false,
        }
    }
}

/// Collaborators the owner drives
pub struct OwnerPorts<E, L> {
    pub encoder: E,
    pub wake_lock: L,
    pub volume: Arc<dyn StorageVolume>,
    pub host: Arc<dyn HostEnvironment>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Cloneable handle to a running [`ResourceOwner`]
#[derive(Clone)]
pub struct ResourceOwnerHandle {
    commands: mpsc::UnboundedSender<OwnerCommand>,
    status: Arc<RwLock<OwnerStatus>>,
    channel: NotificationChannel,
    amplitude: AmplitudeGauge,
}

impl ResourceOwnerHandle {
    pub fn request_start(&self, request: StartRequest) {
        self.send(OwnerCommand::Start(request));
    }

    pub fn request_stop(&self) {
        self.send(OwnerCommand::Stop);
    }

    pub fn request_enable_monitoring(&self) {
        self.send(OwnerCommand::EnableMonitoring);
    }

    pub fn request_disable_monitoring(&self) {
        self.send(OwnerCommand::DisableMonitoring);
    }

    pub fn signal_preemption(&self, cause: Preemption) {
        self.send(OwnerCommand::Preempt(cause));
    }

    pub fn status(&self) -> OwnerStatus {
        self.read().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.read().recording
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.read().started_at
    }

    pub fn current_file_path(&self) -> Option<PathBuf> {
        self.read().file_path.clone()
    }

    pub fn last_completed(&self) -> Option<CompletedRecording> {
        self.read().last_completed.clone()
    }

    pub fn low_storage_advisory(&self) -> bool {
        self.read().low_storage_advisory
    }

    /// Peak amplitude since the previous call, 0 when not recording
    pub fn peak_amplitude(&self) -> u32 {
        if self.is_recording() {
            self.amplitude.take()
        } else {
            0
        }
    }

    /// Listen for owner notifications
    pub fn subscribe(&self) -> Subscription {
        self.channel.subscribe()
    }

    fn send(&self, command: OwnerCommand) {
        if self.commands.send(command).is_err() {
            warn!("resource owner has shut down, command dropped");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, OwnerStatus> {
        self.status.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Requested,
    Preempted(Preemption),
    CapacityExhausted(LimitKind),
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Preempted(cause) => write!(f, "{}", cause),
            Self::CapacityExhausted(limit) => write!(f, "{}", limit),
        }
    }
}

struct ActiveRecording {
    path: PathBuf,
    started_at: SystemTime,
    generation: u64,
}

/// Keeps `acquire`/`release` balanced no matter how often either is called.
struct WakeLockGuard<L: WakeLock> {
    lock: L,
    held: bool,
}

impl<L: WakeLock> WakeLockGuard<L> {
    fn acquire(&mut self) {
        if self.held {
            return;
        }
        match self.lock.acquire() {
            Ok(()) => self.held = true,
            Err(e) => warn!("recording without wake lock: {}", e),
        }
    }

    fn release(&mut self) {
        if self.held {
            self.lock.release();
            self.held = false;
        }
    }
}

impl<L: WakeLock> Drop for WakeLockGuard<L> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Serializes every recording transition in one task.
pub struct ResourceOwner<E: AudioEncoder, L: WakeLock> {
    /// Only touched from the blocking pool, see [`Self::on_encoder`]
    encoder: Arc<Mutex<E>>,
    wake_lock: WakeLockGuard<L>,
    monitor: CapacityMonitor,
    host: Arc<dyn HostEnvironment>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: OwnerConfig,
    commands: mpsc::UnboundedReceiver<OwnerCommand>,
    faults_tx: mpsc::UnboundedSender<EncoderFault>,
    faults_rx: mpsc::UnboundedReceiver<EncoderFault>,
    status: Arc<RwLock<OwnerStatus>>,
    channel: NotificationChannel,
    active: Option<ActiveRecording>,
    generation: u64,
    monitoring: bool,
    advisory_raised: bool,
}

impl<E: AudioEncoder + 'static, L: WakeLock> ResourceOwner<E, L> {
    /// Create the owner and a handle to it. Call [`run`](Self::run) on a
    /// task to start processing commands.
    pub fn new(ports: OwnerPorts<E, L>, config: OwnerConfig) -> (Self, ResourceOwnerHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(OwnerStatus::default()));
        let channel = NotificationChannel::new();

        let handle = ResourceOwnerHandle {
            commands: commands_tx,
            status: Arc::clone(&status),
            channel: channel.clone(),
            amplitude: ports.encoder.amplitude(),
        };

        let owner = Self {
            encoder: Arc::new(Mutex::new(ports.encoder)),
            wake_lock: WakeLockGuard {
                lock: ports.wake_lock,
                held: false,
            },
            monitor: CapacityMonitor::new(ports.volume),
            host: ports.host,
            notifier: ports.notifier,
            clock: ports.clock,
            config,
            commands,
            faults_tx,
            faults_rx,
            status,
            channel,
            active: None,
            generation: 0,
            monitoring: false,
            advisory_raised: false,
        };
        (owner, handle)
    }

    /// Process commands, encoder faults and capacity checks until every
    /// handle has been dropped. A recording still running at that point is
    /// abandoned without committing a length.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let monitoring = self.monitoring && self.active.is_some();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.process(command).await,
                    None => break,
                },
                Some(fault) = self.faults_rx.recv() => self.process_fault(fault).await,
                _ = ticker.tick(), if monitoring => self.check_capacity().await,
            }
        }

        self.abandon().await;
    }

    /// Apply one command.
    pub async fn process(&mut self, command: OwnerCommand) {
        match command {
            OwnerCommand::Start(request) => self.start(request).await,
            OwnerCommand::Stop => self.stop(StopCause::Requested).await,
            OwnerCommand::Preempt(cause) => {
                if self.active.is_some() {
                    info!("recording preempted by {}", cause);
                }
                self.stop(StopCause::Preempted(cause)).await;
            }
            OwnerCommand::EnableMonitoring => {
                if self.active.is_none() {
                    debug!("monitoring not enabled: nothing is recording");
                    return;
                }
                self.monitoring = true;
                self.update_status(|s| s.monitoring = true);
                self.check_capacity().await;
            }
            OwnerCommand::DisableMonitoring => {
                self.monitoring = false;
                self.advisory_raised = false;
                self.update_status(|s| {
                    s.monitoring = false;
                    s.low_storage_advisory = false;
                });
            }
        }
    }

    /// Handle a fault reported by the encoder. Faults from an earlier
    /// recording are ignored.
    pub async fn process_fault(&mut self, fault: EncoderFault) {
        let current = self.active.as_ref().map(|a| a.generation);
        if current != Some(fault.generation) {
            debug!(
                "ignoring stale fault from recording {}: {}",
                fault.generation, fault.error
            );
            return;
        }

        warn!("encoder fault: {}", fault.error);
        let code = self.classify(&fault.error);
        self.active = None;
        self.release_resources().await;
        self.update_status(|s| {
            s.recording = false;
            s.started_at = None;
            s.file_path = None;
            s.monitoring = false;
            s.low_storage_advisory = false;
        });

        self.publish(RecorderEvent::Error(code));
        self.publish(RecorderEvent::StateChanged {
            is_recording: false,
        });
        self.notify(&code.to_string(), NotificationIcon::Error).await;
    }

    /// Re-evaluate remaining capacity of the running recording.
    pub async fn check_capacity(&mut self) {
        if self.active.is_none() {
            return;
        }

        let remaining = self.monitor.time_remaining();
        let limit = self.monitor.current_lower_limit();

        if remaining == 0 {
            self.stop(StopCause::CapacityExhausted(limit)).await;
        } else if remaining <= self.config.low_storage_threshold_secs
            && limit == LimitKind::DiskSpace
        {
            self.raise_low_storage_advisory(remaining).await;
        }
    }

    async fn start(&mut self, request: StartRequest) {
        if let Some(active) = &self.active {
            debug!(
                "start ignored: already recording {}",
                active.path.display()
            );
            return;
        }

        let settings = EncoderSettings::new(request.format, request.quality, &request.path);
        self.monitor.reset();
        self.monitor.set_byte_rate(settings.byte_rate());
        if let Some(max_bytes) = request.max_file_size {
            self.monitor.set_file_size_ceiling(&request.path, max_bytes);
        }

        self.generation += 1;
        let faults = FaultReporter::new(self.generation, self.faults_tx.clone());
        let started = self
            .on_encoder(move |encoder| {
                encoder
                    .prepare(&settings, faults)
                    .and_then(|()| encoder.start())
            })
            .await;
        if let Err(e) = started {
            warn!("failed to start recording: {}", e);
            self.release_encoder().await;
            let code = self.classify(&e);
            self.publish(RecorderEvent::Error(code));
            return;
        }

        let started_at = self.clock.now();
        self.active = Some(ActiveRecording {
            path: request.path.clone(),
            started_at,
            generation: self.generation,
        });
        self.wake_lock.acquire();
        self.monitoring = false;
        self.advisory_raised = false;
        self.update_status(|s| {
            s.recording = true;
            s.started_at = Some(started_at);
            s.file_path = Some(request.path.clone());
            s.monitoring = false;
            s.low_storage_advisory = false;
        });

        info!("recording started: {}", request.path.display());
        self.publish(RecorderEvent::StateChanged { is_recording: true });
        self.notify(
            &format!("Recording {}", display_name(&request.path)),
            NotificationIcon::Recording,
        )
        .await;
    }

    async fn stop(&mut self, cause: StopCause) {
        let Some(active) = self.active.take() else {
            debug!("stop ({}) ignored: not recording", cause);
            return;
        };

        if let Err(e) = self.on_encoder(|encoder| encoder.stop()).await {
            warn!("encoder did not stop cleanly: {}", e);
        }
        self.release_resources().await;

        let elapsed = self
            .clock
            .now()
            .duration_since(active.started_at)
            .unwrap_or_default();
        let completed = CompletedRecording {
            path: active.path,
            started_at: active.started_at,
            length_secs: sample_length_secs(elapsed),
        };
        info!(
            "recording stopped ({}): {} after {} s",
            cause,
            completed.path.display(),
            completed.length_secs
        );

        let message = format!("Saved {}", display_name(&completed.path));
        self.update_status(|s| {
            s.recording = false;
            s.started_at = None;
            s.file_path = None;
            s.last_completed = Some(completed);
            s.monitoring = false;
            s.low_storage_advisory = false;
        });

        self.publish(RecorderEvent::StateChanged {
            is_recording: false,
        });
        if let StopCause::CapacityExhausted(limit) = cause {
            self.publish(RecorderEvent::Error(ErrorCode::CapacityExhausted(limit)));
        }
        self.notify(&message, NotificationIcon::Saved).await;
    }

    async fn raise_low_storage_advisory(&mut self, remaining_secs: u64) {
        if self.advisory_raised {
            return;
        }
        self.advisory_raised = true;
        self.update_status(|s| s.low_storage_advisory = true);

        let minutes = remaining_secs.div_ceil(60);
        warn!("storage is running low: about {} min left", minutes);
        self.notify(
            &format!("Storage is running low: about {} min of recording left", minutes),
            NotificationIcon::LowStorage,
        )
        .await;
    }

    async fn abandon(&mut self) {
        if let Some(active) = self.active.take() {
            warn!(
                "shutting down while recording, abandoning {}",
                active.path.display()
            );
        }
        self.release_resources().await;
        self.update_status(|s| {
            s.recording = false;
            s.started_at = None;
            s.file_path = None;
            s.monitoring = false;
        });
    }

    async fn release_resources(&mut self) {
        self.release_encoder().await;
        self.wake_lock.release();
        self.monitoring = false;
        self.advisory_raised = false;
    }

    async fn release_encoder(&self) {
        let released = self
            .on_encoder(|encoder| {
                encoder.release();
                Ok(())
            })
            .await;
        if let Err(e) = released {
            debug!("encoder release: {}", e);
        }
    }

    /// Run a blocking encoder call on the blocking pool. Stopping joins the
    /// capture thread and may compress the whole recording.
    async fn on_encoder<T, F>(&self, op: F) -> Result<T, EncoderError>
    where
        T: Send + 'static,
        F: FnOnce(&mut E) -> Result<T, EncoderError> + Send + 'static,
    {
        let encoder = Arc::clone(&self.encoder);
        tokio::task::spawn_blocking(move || {
            let mut encoder = encoder.lock().unwrap_or_else(|e| e.into_inner());
            op(&mut *encoder)
        })
        .await
        .map_err(|e| EncoderError::Device(format!("Encoder task error: {}", e)))?
    }

    fn classify(&self, error: &EncoderError) -> ErrorCode {
        if self.host.in_call() {
            ErrorCode::InCallRecord
        } else if error.is_storage() {
            ErrorCode::StorageAccess
        } else {
            ErrorCode::Internal
        }
    }

    fn publish(&self, event: RecorderEvent) {
        self.channel.publish(event);
    }

    async fn notify(&self, message: &str, icon: NotificationIcon) {
        if !self.config.enable_notify {
            return;
        }
        if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, message, icon).await {
            warn!("could not show notification: {}", e);
        }
    }

    fn update_status(&self, apply: impl FnOnce(&mut OwnerStatus)) {
        let mut status = self.status.write().unwrap_or_else(|e| e.into_inner());
        apply(&mut status);
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
