//! Audio encoder port interface

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::recording::EncoderSettings;

/// Exclusive upper bound of reported peak amplitudes
pub const MAX_AMPLITUDE: u32 = 32_768;

/// Encoder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncoderError {
    #[error("Cannot write recording file: {0}")]
    Storage(String),

    #[error("Failed to prepare encoder: {0}")]
    PrepareFailed(String),

    #[error("Failed to start encoder: {0}")]
    StartFailed(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to encode recording: {0}")]
    Encode(String),

    #[error("No audio input device available")]
    NoInputDevice,
}

impl EncoderError {
    /// Failure caused by the storage location rather than the hardware
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// A failure raised by the encoder while a recording is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderFault {
    /// Recording generation the fault belongs to
    pub generation: u64,
    pub error: EncoderError,
}

/// Channel an encoder uses to report asynchronous failures.
///
/// Each reporter is stamped with the recording generation it was issued
/// for, so faults that arrive after that recording ended can be ignored.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    generation: u64,
    tx: mpsc::UnboundedSender<EncoderFault>,
}

impl FaultReporter {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<EncoderFault>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a fault. Delivery is best effort.
    pub fn report(&self, error: EncoderError) {
        let _ = self.tx.send(EncoderFault {
            generation: self.generation,
            error,
        });
    }
}

/// Peak amplitude seen since the last read, shared between the capture
/// thread and readers.
#[derive(Debug, Clone, Default)]
pub struct AmplitudeGauge(Arc<AtomicU32>);

impl AmplitudeGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample block's peak, keeping the maximum
    pub fn record(&self, peak: u32) {
        self.0
            .fetch_max(peak.min(MAX_AMPLITUDE - 1), Ordering::Relaxed);
    }

    /// Read the maximum since the previous call and reset it
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Port for the exclusive microphone/encoder resource.
///
/// Calls are made from a single owner task, one recording at a time:
/// `prepare`, `start`, then `stop` and `release`. `release` must be safe to
/// call in any state. Failures after `start` returns are delivered through
/// the [`FaultReporter`] passed to `prepare`.
pub trait AudioEncoder: Send {
    /// Open the output file described by `settings` and get ready to capture.
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        faults: FaultReporter,
    ) -> Result<(), EncoderError>;

    /// Begin capturing into the prepared file.
    fn start(&mut self) -> Result<(), EncoderError>;

    /// Stop capturing and finalize the output file.
    fn stop(&mut self) -> Result<(), EncoderError>;

    /// Drop every hardware handle.
    fn release(&mut self);

    /// Gauge fed with the peak amplitude of captured audio
    fn amplitude(&self) -> AmplitudeGauge;
}

impl AudioEncoder for Box<dyn AudioEncoder> {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        faults: FaultReporter,
    ) -> Result<(), EncoderError> {
        self.as_mut().prepare(settings, faults)
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        self.as_mut().start()
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        self.as_mut().stop()
    }

    fn release(&mut self) {
        self.as_mut().release()
    }

    fn amplitude(&self) -> AmplitudeGauge {
        self.as_ref().amplitude()
    }
}
