//! Session host integration tests
//!
//! Drives a [`SessionHost`] the way the console and daemon loops do, with
//! the hardware ports replaced by in-memory fakes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tempfile::TempDir;

use sound_recorder::application::ports::{
    AmplitudeGauge, AudioEncoder, AudioPlayer, CatalogEntry, CatalogError, CatalogId,
    CatalogSink, Clock, EncoderError, FaultReporter, HostEnvironment, NotificationError,
    NotificationIcon, Notifier, PlaybackError, StorageVolume, VolumeStats, WakeLock,
    WakeLockError,
};
use sound_recorder::application::{
    ControllerConfig, ControllerMode, OwnerConfig, OwnerPorts, Preemption, ResourceOwner,
    ResourceOwnerHandle,
};
use sound_recorder::cli::{HostPorts, ReplyKind, SessionCommand, SessionHost};
use sound_recorder::domain::error::ErrorCode;
use sound_recorder::domain::recording::EncoderSettings;
use sound_recorder::domain::SessionState;
use sound_recorder::infrastructure::DesktopHost;

struct TestClock(Mutex<SystemTime>);

impl TestClock {
    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap()
    }
}

/// Writes an empty header so the file exists, captures nothing
struct SilentEncoder {
    gauge: AmplitudeGauge,
    /// Another application holds the microphone
    mic_busy: Arc<AtomicBool>,
}

impl AudioEncoder for SilentEncoder {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        _faults: FaultReporter,
    ) -> Result<(), EncoderError> {
        fs::write(&settings.path, [0u8; 44]).map_err(|e| EncoderError::Storage(e.to_string()))
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        if self.mic_busy.load(Ordering::SeqCst) {
            return Err(EncoderError::Device("input device busy".into()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        Ok(())
    }

    fn release(&mut self) {}

    fn amplitude(&self) -> AmplitudeGauge {
        self.gauge.clone()
    }
}

struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        Ok(())
    }

    fn release(&mut self) {}
}

struct RoomyVolume(PathBuf);

impl StorageVolume for RoomyVolume {
    fn root(&self) -> &Path {
        &self.0
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn stats(&self) -> io::Result<VolumeStats> {
        Ok(VolumeStats {
            available_blocks: 1 << 30,
            block_size: 4096,
        })
    }
}

struct QuietNotifier;

#[async_trait]
impl Notifier for QuietNotifier {
    async fn notify(
        &self,
        _title: &str,
        _message: &str,
        _icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCatalog(Mutex<Vec<CatalogEntry>>);

#[async_trait]
impl CatalogSink for MemoryCatalog {
    async fn insert(&self, entry: CatalogEntry) -> Result<CatalogId, CatalogError> {
        let mut entries = self.0.lock().unwrap();
        entries.push(entry);
        Ok(CatalogId(entries.len().to_string()))
    }
}

#[derive(Default)]
struct IdlePlayer {
    loaded: bool,
}

impl AudioPlayer for IdlePlayer {
    fn load(&mut self, _path: &Path) -> Result<(), PlaybackError> {
        self.loaded = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn seek(&mut self, _fraction: f32) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self) {
        self.loaded = false;
    }

    fn position_secs(&self) -> f64 {
        0.0
    }

    fn duration_secs(&self) -> f64 {
        if self.loaded {
            3.0
        } else {
            0.0
        }
    }

    fn is_finished(&self) -> bool {
        false
    }
}

struct Harness {
    host: SessionHost,
    owner: ResourceOwnerHandle,
    clock: Arc<TestClock>,
    catalog: Arc<MemoryCatalog>,
    desktop: Arc<DesktopHost>,
    mic_busy: Arc<AtomicBool>,
    dir: TempDir,
}

impl Harness {
    fn new(mode: ControllerMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(TestClock(Mutex::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )));
        let volume: Arc<dyn StorageVolume> = Arc::new(RoomyVolume(dir.path().to_path_buf()));
        let catalog = Arc::new(MemoryCatalog::default());
        let desktop = Arc::new(DesktopHost::new());
        let mic_busy = Arc::new(AtomicBool::new(false));

        let (owner, handle) = ResourceOwner::new(
            OwnerPorts {
                encoder: SilentEncoder {
                    gauge: AmplitudeGauge::new(),
                    mic_busy: Arc::clone(&mic_busy),
                },
                wake_lock: NoWakeLock,
                volume: Arc::clone(&volume),
                host: Arc::clone(&desktop) as Arc<dyn HostEnvironment>,
                notifier: Arc::new(QuietNotifier),
                clock: clock.clone(),
            },
            OwnerConfig::default(),
        );
        tokio::spawn(owner.run());

        let mut config = ControllerConfig::new(dir.path());
        config.mode = mode;
        let host = SessionHost::new(
            handle.clone(),
            HostPorts {
                volume,
                catalog: catalog.clone(),
                clock: clock.clone(),
                new_player: Box::new(|| Box::new(IdlePlayer::default()) as Box<dyn AudioPlayer>),
                desktop: Arc::clone(&desktop),
            },
            config,
        );

        Self {
            host,
            owner: handle,
            clock,
            catalog,
            desktop,
            mic_busy,
            dir,
        }
    }

    /// Apply owner notifications until things go quiet.
    async fn pump(&mut self) {
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(100), self.host.next_event()).await
        {
            self.host.on_event(event);
        }
    }

    /// Start a recording and let a few seconds pass on the clock.
    async fn record(&mut self) -> PathBuf {
        let reply = self.host.execute(SessionCommand::Record).await;
        assert_eq!(reply.kind, ReplyKind::Success, "{}", reply.message);
        self.pump().await;
        let view = self.host.view().unwrap();
        assert_eq!(view.state, SessionState::Recording);
        self.clock.advance(Duration::from_millis(2600));
        view.target_file.unwrap()
    }

    fn catalogued(&self) -> Vec<PathBuf> {
        self.catalog
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.path.clone())
            .collect()
    }
}

#[tokio::test]
async fn record_stop_quit_commits_once() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let path = h.record().await;
    assert!(path.starts_with(h.dir.path()));

    let reply = h.host.execute(SessionCommand::Stop).await;
    assert_eq!(reply.kind, ReplyKind::Success);
    assert!(reply.message.contains("00:03"), "{}", reply.message);
    h.pump().await;

    let reply = h.host.execute(SessionCommand::Quit).await;
    assert!(reply.exit);
    assert_eq!(h.host.committed_path(), Some(path.as_path()));
    assert_eq!(h.catalogued(), vec![path]);
}

#[tokio::test]
async fn stop_right_after_record_is_debounced() {
    let mut h = Harness::new(ControllerMode::Standalone);
    h.host.execute(SessionCommand::Record).await;
    h.pump().await;

    let reply = h.host.execute(SessionCommand::Stop).await;
    assert_eq!(reply.kind, ReplyKind::Warning);
    assert!(reply.message.contains("too soon"));
    assert!(h.owner.is_recording());

    h.host.shutdown().await;
    assert!(!h.owner.is_recording());
}

#[tokio::test]
async fn hidden_recording_continues_and_is_adopted_on_show() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let path = h.record().await;

    let reply = h.host.hide().await;
    assert!(reply.message.contains("background"), "{}", reply.message);
    assert!(!h.host.is_attached());
    assert!(h.owner.is_recording());

    let status = h.host.execute(SessionCommand::Status).await;
    assert!(status.message.contains("state: hidden"));
    assert!(status.message.contains(&path.display().to_string()));

    let reply = h.host.execute(SessionCommand::Record).await;
    assert_eq!(reply.kind, ReplyKind::Warning);

    h.host.show();
    let view = h.host.view().unwrap();
    assert_eq!(view.state, SessionState::Recording);
    assert_eq!(view.target_file.as_deref(), Some(path.as_path()));

    h.host.execute(SessionCommand::Quit).await;
    assert_eq!(h.host.committed_path(), Some(path.as_path()));
    assert!(!h.owner.is_recording());
}

#[tokio::test]
async fn quit_while_hidden_commits_background_recording() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let path = h.record().await;
    h.host.hide().await;

    let reply = h.host.execute(SessionCommand::Quit).await;
    assert!(reply.exit);
    assert!(reply.message.contains("Saved"));
    assert_eq!(h.catalogued(), vec![path]);
}

#[tokio::test]
async fn must_finish_exits_with_committed_path() {
    let mut h = Harness::new(ControllerMode::MustFinish);
    let path = h.record().await;

    let reply = h.host.execute(SessionCommand::Finish).await;
    assert!(reply.exit);
    assert_eq!(reply.kind, ReplyKind::Success);
    assert!(h.host.is_finished());
    assert_eq!(h.host.committed_path(), Some(path.as_path()));
}

#[tokio::test]
async fn must_finish_back_while_recording_discards_file() {
    let mut h = Harness::new(ControllerMode::MustFinish);
    let path = h.record().await;

    let reply = h.host.execute(SessionCommand::Back).await;
    assert!(reply.message.contains("discarded"));
    assert!(!path.exists());
    h.pump().await;

    let reply = h.host.execute(SessionCommand::Back).await;
    assert!(reply.exit);
    assert!(h.host.committed_path().is_none());
}

#[tokio::test]
async fn rename_after_stop_moves_file() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let path = h.record().await;
    h.host.execute(SessionCommand::Stop).await;
    h.pump().await;

    let reply = h
        .host
        .execute(SessionCommand::Rename("take-two".to_string()))
        .await;
    assert_eq!(reply.kind, ReplyKind::Success);
    let renamed = h.dir.path().join("take-two.wav");
    assert!(renamed.exists());
    assert!(!path.exists());

    let reply = h
        .host
        .execute(SessionCommand::Rename("bad/name".to_string()))
        .await;
    assert_eq!(reply.kind, ReplyKind::Error);
}

#[tokio::test]
async fn existing_file_needs_confirmation() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let target = h
        .host
        .view()
        .map(|v| h.dir.path().join(format!("{}.wav", v.name)))
        .unwrap();
    fs::write(&target, b"old").unwrap();

    let reply = h.host.execute(SessionCommand::Record).await;
    assert_eq!(reply.kind, ReplyKind::Warning);
    assert!(reply.message.contains("Overwrite"));

    let reply = h.host.execute(SessionCommand::CancelOverwrite).await;
    assert_eq!(reply.kind, ReplyKind::Info);
    assert!(!h.owner.is_recording());
    assert_eq!(fs::read(&target).unwrap(), b"old");
}

#[tokio::test]
async fn recording_during_a_call_reports_in_call() {
    let mut h = Harness::new(ControllerMode::Standalone);
    let path = h.record().await;

    let reply = h
        .host
        .execute(SessionCommand::Preempt(Preemption::IncomingCall))
        .await;
    assert_eq!(reply.kind, ReplyKind::Info);
    h.pump().await;
    assert!(h.desktop.in_call());
    assert!(!h.owner.is_recording());
    assert_eq!(h.owner.last_completed().map(|c| c.path), Some(path));

    // the call keeps the microphone
    h.mic_busy.store(true, Ordering::SeqCst);
    h.host.execute(SessionCommand::New).await;
    h.clock.advance(Duration::from_secs(1));
    let reply = h.host.execute(SessionCommand::Record).await;
    assert_eq!(reply.kind, ReplyKind::Success, "{}", reply.message);
    h.pump().await;
    let advisory = h.host.take_advisory().unwrap();
    assert_eq!(advisory.message, ErrorCode::InCallRecord.to_string());

    let reply = h.host.execute(SessionCommand::Hangup).await;
    assert_eq!(reply.message, "Call ended");
    assert!(!h.desktop.in_call());
    h.mic_busy.store(false, Ordering::SeqCst);
    h.clock.advance(Duration::from_secs(1));
    h.record().await;
}
