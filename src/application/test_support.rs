//! Hand-written fakes for the application ports

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use super::ports::{
    AmplitudeGauge, AudioEncoder, AudioPlayer, CatalogEntry, CatalogError, CatalogId,
    CatalogSink, Clock, EncoderError, FaultReporter, HostEnvironment, NotificationError,
    NotificationIcon, Notifier, PlaybackError, StorageVolume, VolumeStats, WakeLock,
    WakeLockError,
};
use crate::domain::recording::EncoderSettings;

pub struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct EncoderLog {
    pub prepared: Vec<EncoderSettings>,
    pub starts: usize,
    pub stops: usize,
    pub releases: usize,
    pub reporter: Option<FaultReporter>,
    pub fail_prepare: Option<EncoderError>,
    pub fail_start: Option<EncoderError>,
    /// How long `stop` takes, as when a long take is compressed
    pub stop_delay: Duration,
}

/// Encoder that writes a placeholder header at prepare time and records calls
pub struct FakeEncoder {
    log: Arc<Mutex<EncoderLog>>,
    gauge: AmplitudeGauge,
}

impl FakeEncoder {
    pub fn new() -> (Self, Arc<Mutex<EncoderLog>>) {
        let log = Arc::new(Mutex::new(EncoderLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                gauge: AmplitudeGauge::new(),
            },
            log,
        )
    }
}

impl AudioEncoder for FakeEncoder {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        faults: FaultReporter,
    ) -> Result<(), EncoderError> {
        let mut log = self.log.lock().unwrap();
        log.prepared.push(settings.clone());
        if let Some(err) = log.fail_prepare.take() {
            return Err(err);
        }
        let _ = fs::write(&settings.path, [0u8; 44]);
        log.reporter = Some(faults);
        Ok(())
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        let mut log = self.log.lock().unwrap();
        if let Some(err) = log.fail_start.take() {
            return Err(err);
        }
        log.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        let delay = {
            let mut log = self.log.lock().unwrap();
            log.stops += 1;
            log.stop_delay
        };
        std::thread::sleep(delay);
        Ok(())
    }

    fn release(&mut self) {
        self.log.lock().unwrap().releases += 1;
    }

    fn amplitude(&self) -> AmplitudeGauge {
        self.gauge.clone()
    }
}

pub struct FakeVolume {
    root: PathBuf,
    ready: AtomicBool,
    free_blocks: AtomicU64,
    block_size: u64,
}

impl FakeVolume {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_path_buf(),
            ready: AtomicBool::new(true),
            free_blocks: AtomicU64::new(1_000_000_000),
            block_size: 4096,
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_free_blocks(&self, blocks: u64) {
        self.free_blocks.store(blocks, Ordering::SeqCst);
    }
}

impl StorageVolume for FakeVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn stats(&self) -> io::Result<VolumeStats> {
        Ok(VolumeStats {
            available_blocks: self.free_blocks.load(Ordering::SeqCst),
            block_size: self.block_size,
        })
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub in_call: AtomicBool,
}

impl HostEnvironment for FakeHost {
    fn in_call(&self) -> bool {
        self.in_call.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct WakeLockCounts {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

pub struct FakeWakeLock(Arc<WakeLockCounts>);

impl FakeWakeLock {
    pub fn new() -> (Self, Arc<WakeLockCounts>) {
        let counts = Arc::new(WakeLockCounts::default());
        (Self(Arc::clone(&counts)), counts)
    }
}

impl WakeLock for FakeWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        self.0.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, NotificationIcon)>>,
    /// Refuse every notification, as with no notification service running
    pub unavailable: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        _title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("no service".into()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), icon));
        Ok(())
    }
}

#[derive(Default)]
pub struct PlayerLog {
    pub loaded: Option<PathBuf>,
    pub playing: bool,
    pub seeks: Vec<f32>,
    pub position: f64,
    pub duration: f64,
    pub finished: bool,
    pub fail_load: Option<PlaybackError>,
}

pub struct FakePlayer(Arc<Mutex<PlayerLog>>);

impl FakePlayer {
    pub fn new() -> (Self, Arc<Mutex<PlayerLog>>) {
        let log = Arc::new(Mutex::new(PlayerLog {
            duration: 10.0,
            ..Default::default()
        }));
        (Self(Arc::clone(&log)), log)
    }
}

impl AudioPlayer for FakePlayer {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let mut log = self.0.lock().unwrap();
        if let Some(err) = log.fail_load.take() {
            return Err(err);
        }
        log.loaded = Some(path.to_path_buf());
        log.finished = false;
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        self.0.lock().unwrap().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.0.lock().unwrap().playing = false;
        Ok(())
    }

    fn seek(&mut self, fraction: f32) -> Result<(), PlaybackError> {
        let mut log = self.0.lock().unwrap();
        log.seeks.push(fraction);
        log.position = log.duration * fraction as f64;
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.loaded = None;
        log.playing = false;
    }

    fn position_secs(&self) -> f64 {
        self.0.lock().unwrap().position
    }

    fn duration_secs(&self) -> f64 {
        self.0.lock().unwrap().duration
    }

    fn is_finished(&self) -> bool {
        self.0.lock().unwrap().finished
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub entries: Mutex<Vec<CatalogEntry>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl CatalogSink for MemoryCatalog {
    async fn insert(&self, entry: CatalogEntry) -> Result<CatalogId, CatalogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::WriteFailed("read-only".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        entries.push(entry);
        Ok(CatalogId(entries.len().to_string()))
    }
}
