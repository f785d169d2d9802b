//! Config resolution and adapter wiring shared by the console and daemon runners

use std::env;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::application::ports::{
    AudioPlayer, CatalogSink, Clock, ConfigStore, HostEnvironment, Notifier, StorageVolume,
    SystemClock,
};
use crate::application::{
    ControllerConfig, ControllerMode, OwnerConfig, OwnerPorts, ResourceOwner, MONITOR_INTERVAL,
};
use crate::domain::config::AppConfig;
use crate::domain::recording::{ByteSize, Duration, OutputFormat};
use crate::infrastructure::notification::create_notifier;
use crate::infrastructure::recording::create_encoder;
use crate::infrastructure::{
    DesktopHost, JsonCatalog, LocalVolume, RodioPlayer, SleepInhibitor, XdgConfigStore,
};

use super::args::SessionOptions;
use super::session_host::{HostPorts, SessionHost};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
/// `--must-finish` ended without a committed recording
pub const EXIT_NOTHING_COMMITTED: u8 = 3;

/// Environment variable overriding the recordings directory
pub const DIR_ENV: &str = "SOUND_RECORDER_DIR";

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            log::warn!("ignoring config file: {}", e);
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        recordings_dir: env::var(DIR_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Validate the merged config into session options.
///
/// Unlike the `*_or_default` accessors, malformed values are reported
/// instead of silently replaced.
pub fn resolve_options(
    config: &AppConfig,
    mode: ControllerMode,
) -> Result<SessionOptions, String> {
    let format = match config.format.as_deref() {
        Some(s) => s
            .parse::<OutputFormat>()
            .map_err(|e| format!("Invalid format: {}", e))?,
        None => OutputFormat::default(),
    };
    let max_file_size = config
        .max_file_size
        .as_deref()
        .map(|s| s.parse::<ByteSize>())
        .transpose()
        .map_err(|e| format!("Invalid max-file-size: {}", e))?;
    let low_storage_threshold = match config.low_storage_threshold.as_deref() {
        Some(s) => s
            .parse::<Duration>()
            .map_err(|e| format!("Invalid low_storage_threshold: {}", e))?,
        None => Duration::default_low_storage_threshold(),
    };

    Ok(SessionOptions {
        recordings_dir: config.recordings_dir_or_default(),
        format,
        quality: config.quality_or_default(),
        max_file_size,
        low_storage_threshold,
        mode,
        notify: config.notify_or_default(),
    })
}

pub fn controller_config(options: &SessionOptions) -> ControllerConfig {
    ControllerConfig {
        recordings_dir: options.recordings_dir.clone(),
        format: options.format,
        quality: options.quality,
        max_file_size: options.max_file_size.map(|s| s.as_bytes()),
        mode: options.mode,
        low_storage_threshold_secs: options.low_storage_threshold.as_secs(),
    }
}

/// Wire the desktop adapters, spawn the resource owner and attach a session.
pub fn start_session(options: &SessionOptions) -> (JoinHandle<()>, SessionHost) {
    let volume: Arc<dyn StorageVolume> = Arc::new(LocalVolume::new(&options.recordings_dir));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::from(create_notifier());
    let desktop = Arc::new(DesktopHost::new());

    let (owner, handle) = ResourceOwner::new(
        OwnerPorts {
            encoder: create_encoder(),
            wake_lock: SleepInhibitor::new(),
            volume: Arc::clone(&volume),
            host: Arc::clone(&desktop) as Arc<dyn HostEnvironment>,
            notifier,
            clock: Arc::clone(&clock),
        },
        OwnerConfig {
            low_storage_threshold_secs: options.low_storage_threshold.as_secs(),
            monitor_interval: MONITOR_INTERVAL,
            enable_notify: options.notify,
        },
    );
    let owner_task = tokio::spawn(owner.run());

    let catalog: Arc<dyn CatalogSink> = Arc::new(JsonCatalog::in_dir(&options.recordings_dir));
    let ports = HostPorts {
        volume,
        catalog,
        clock,
        new_player: Box::new(|| Box::new(RodioPlayer::new()) as Box<dyn AudioPlayer>),
        desktop,
    };

    (
        owner_task,
        SessionHost::new(handle, ports, controller_config(options)),
    )
}
