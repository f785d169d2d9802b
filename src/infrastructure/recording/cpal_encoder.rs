//! Microphone capture with cpal
//!
//! The input stream lives on a dedicated capture thread (cpal::Stream is
//! not Send). Captured audio is mixed down to mono, resampled to the
//! requested rate and appended to a WAV spool every
//! [`FLUSH_INTERVAL`]. FLAC recordings are compressed once capture stops.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use log::{debug, info, warn};
use rubato::{FftFixedIn, Resampler};

use super::flac_encoder::{compress_in_place, EncodingError};
use super::wav::WavSpool;
use crate::application::ports::{AmplitudeGauge, AudioEncoder, EncoderError, FaultReporter};
use crate::domain::recording::{EncoderSettings, OutputFormat};

/// How often captured audio is written to the spool
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// How long `start` waits for the input stream to come up
const START_TIMEOUT: Duration = Duration::from_secs(3);

const RESAMPLER_CHUNK: usize = 1024;

type SharedBuffer = Arc<Mutex<Vec<i16>>>;

struct Prepared {
    settings: EncoderSettings,
    writer: WavSpool,
    faults: FaultReporter,
}

struct Capture {
    format: OutputFormat,
    path: PathBuf,
    running: Arc<AtomicBool>,
    thread: JoinHandle<Result<WavSpool, EncoderError>>,
}

impl Capture {
    fn join(self) -> Result<WavSpool, EncoderError> {
        self.running.store(false, Ordering::SeqCst);
        self.thread
            .join()
            .map_err(|_| EncoderError::Device("capture thread panicked".into()))?
    }
}

/// [`AudioEncoder`] backed by the default input device
pub struct CpalEncoder {
    gauge: AmplitudeGauge,
    prepared: Option<Prepared>,
    capture: Option<Capture>,
}

impl CpalEncoder {
    pub fn new() -> Self {
        Self {
            gauge: AmplitudeGauge::new(),
            prepared: None,
            capture: None,
        }
    }

    fn input_device() -> Result<cpal::Device, EncoderError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(EncoderError::NoInputDevice)
    }

    /// Pick an i16 or f32 input configuration, preferring fewer channels
    /// and a range that contains `target_rate`.
    fn input_config(
        device: &cpal::Device,
        target_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), EncoderError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| EncoderError::PrepareFailed(format!("Failed to get configs: {}", e)))?;

        let includes_target = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= target_rate && c.max_sample_rate().0 >= target_rate
        };

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }
            let is_better = match &best {
                None => true,
                Some(current) => {
                    let fewer_channels = config.channels() < current.channels();
                    let better_rate = includes_target(&config) && !includes_target(current);
                    fewer_channels || better_rate
                }
            };
            if is_better {
                best = Some(config);
            }
        }

        let range = best.ok_or_else(|| {
            EncoderError::PrepareFailed("No suitable input configuration".into())
        })?;
        let sample_rate = if includes_target(&range) {
            SampleRate(target_rate)
        } else {
            range.min_sample_rate()
        };

        Ok((
            StreamConfig {
                channels: range.channels(),
                sample_rate,
                buffer_size: cpal::BufferSize::Default,
            },
            range.sample_format(),
        ))
    }

    fn stereo_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels <= 1 {
            return samples.to_vec();
        }
        samples
            .chunks(channels as usize)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / chunk.len() as i32) as i16
            })
            .collect()
    }

    fn open_stream(
        target_rate: u32,
        buffer: &SharedBuffer,
        gauge: &AmplitudeGauge,
        faults: &FaultReporter,
    ) -> Result<(cpal::Stream, u32), EncoderError> {
        let device = Self::input_device()?;
        let (config, sample_format) = Self::input_config(&device, target_rate)?;
        let channels = config.channels;

        let sink = {
            let buffer = Arc::clone(buffer);
            let gauge = gauge.clone();
            move |mono: Vec<i16>| {
                let peak = mono.iter().map(|s| s.unsigned_abs() as u32).max();
                gauge.record(peak.unwrap_or(0));
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend_from_slice(&mono);
                }
            }
        };
        let on_error = {
            let faults = faults.clone();
            move |err: cpal::StreamError| {
                warn!("audio stream error: {}", err);
                faults.report(EncoderError::Device(err.to_string()));
            }
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    sink(Self::stereo_to_mono(data, channels));
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data.iter().map(|&s| (s * 32767.0) as i16).collect();
                    sink(Self::stereo_to_mono(&i16_data, channels));
                },
                on_error,
                None,
            ),
            other => {
                return Err(EncoderError::StartFailed(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| EncoderError::StartFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| EncoderError::StartFailed(e.to_string()))?;
        Ok((stream, config.sample_rate.0))
    }

    /// Body of the capture thread
    fn capture(
        mut writer: WavSpool,
        running: Arc<AtomicBool>,
        gauge: AmplitudeGauge,
        faults: FaultReporter,
        ready: mpsc::Sender<Result<(), EncoderError>>,
    ) -> Result<WavSpool, EncoderError> {
        let buffer: SharedBuffer = Arc::new(Mutex::new(Vec::new()));
        let opened = Self::open_stream(writer.sample_rate(), &buffer, &gauge, &faults)
            .and_then(|(stream, device_rate)| {
                let resampler = StreamResampler::new(device_rate, writer.sample_rate())?;
                Ok((stream, resampler))
            });
        let (stream, mut resampler) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready.send(Err(e.clone()));
                return Err(e);
            }
        };
        let _ = ready.send(Ok(()));

        let drain = |buffer: &SharedBuffer| {
            buffer
                .lock()
                .map(|mut b| std::mem::take(&mut *b))
                .unwrap_or_default()
        };

        while running.load(Ordering::SeqCst) {
            thread::sleep(FLUSH_INTERVAL);
            let chunk = resampler.process(&drain(&buffer))?;
            if let Err(e) = writer.write_samples(&chunk) {
                warn!("cannot write recording: {}", e);
                faults.report(EncoderError::Storage(e.to_string()));
                return Err(EncoderError::Storage(e.to_string()));
            }
        }

        drop(stream);
        let mut tail = resampler.process(&drain(&buffer))?;
        tail.extend(resampler.flush()?);
        writer
            .write_samples(&tail)
            .map_err(|e| EncoderError::Storage(e.to_string()))?;
        Ok(writer)
    }

    fn finish(capture: Capture) -> Result<(), EncoderError> {
        let format = capture.format;
        let path = capture.path.clone();
        let writer = capture.join()?;
        let bytes = writer
            .finalize()
            .map_err(|e| EncoderError::Storage(e.to_string()))?;
        debug!("captured {} bytes of PCM into {}", bytes, path.display());

        if format == OutputFormat::Flac {
            compress_in_place(&path).map_err(|e| match e {
                EncodingError::Io(e) => EncoderError::Storage(e.to_string()),
                other => EncoderError::Encode(other.to_string()),
            })?;
        }
        info!("recording written to {}", path.display());
        Ok(())
    }
}

impl Default for CpalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for CpalEncoder {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        faults: FaultReporter,
    ) -> Result<(), EncoderError> {
        if self.capture.is_some() {
            return Err(EncoderError::PrepareFailed(
                "Recording already in progress".into(),
            ));
        }
        Self::input_device()?;
        let writer = WavSpool::create(&settings.path, settings.sample_rate())
            .map_err(|e| EncoderError::Storage(e.to_string()))?;

        self.prepared = Some(Prepared {
            settings: settings.clone(),
            writer,
            faults,
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        let Prepared {
            settings,
            writer,
            faults,
        } = self
            .prepared
            .take()
            .ok_or_else(|| EncoderError::StartFailed("Encoder not prepared".into()))?;

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = {
            let running = Arc::clone(&running);
            let gauge = self.gauge.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || Self::capture(writer, running, gauge, faults, ready_tx))
                .map_err(|e| EncoderError::StartFailed(e.to_string()))?
        };
        let capture = Capture {
            format: settings.format,
            path: settings.path,
            running,
            thread,
        };

        match ready_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => {
                self.capture = Some(capture);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = capture.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                capture.running.store(false, Ordering::SeqCst);
                Err(EncoderError::StartFailed(
                    "Timed out waiting for the input stream".into(),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => Err(capture
                .join()
                .err()
                .unwrap_or_else(|| EncoderError::StartFailed("Capture thread exited".into()))),
        }
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        if let Some(prepared) = self.prepared.take() {
            let _ = prepared.writer.finalize();
        }
        match self.capture.take() {
            Some(capture) => Self::finish(capture),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        if let Some(prepared) = self.prepared.take() {
            let _ = prepared.writer.finalize();
        }
        if let Some(capture) = self.capture.take() {
            let path = capture.path.clone();
            match capture.join() {
                Ok(writer) => {
                    let _ = writer.finalize();
                }
                Err(e) => debug!("capture of {} ended with: {}", path.display(), e),
            }
        }
        self.gauge.take();
    }

    fn amplitude(&self) -> AmplitudeGauge {
        self.gauge.clone()
    }
}

impl Drop for CpalEncoder {
    fn drop(&mut self) {
        self.release();
    }
}

/// Chunked resampler fed with arbitrarily sized blocks of mono audio.
struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    ratio: f64,
    frames_in: u64,
    frames_out: u64,
}

impl StreamResampler {
    fn new(source_rate: u32, target_rate: u32) -> Result<Self, EncoderError> {
        let inner = if source_rate == target_rate {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(
                    source_rate as usize,
                    target_rate as usize,
                    RESAMPLER_CHUNK,
                    2,
                    1,
                )
                .map_err(|e| EncoderError::StartFailed(format!("Resampler init failed: {}", e)))?,
            )
        };
        Ok(Self {
            inner,
            pending: Vec::new(),
            ratio: target_rate as f64 / source_rate as f64,
            frames_in: 0,
            frames_out: 0,
        })
    }

    fn process(&mut self, samples: &[i16]) -> Result<Vec<i16>, EncoderError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(samples.to_vec());
        };
        self.frames_in += samples.len() as u64;
        self.pending
            .extend(samples.iter().map(|&s| s as f32 / 32768.0));

        let mut output = Vec::new();
        while self.pending.len() >= inner.input_frames_next() {
            let needed = inner.input_frames_next();
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let resampled = inner
                .process(&[chunk], None)
                .map_err(|e| EncoderError::Device(format!("Resampling failed: {}", e)))?;
            output.extend(resampled[0].iter().map(|&s| to_i16(s)));
        }
        self.frames_out += output.len() as u64;
        Ok(output)
    }

    /// Push out what is still buffered, trimmed to the expected length.
    fn flush(&mut self) -> Result<Vec<i16>, EncoderError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        let expected = (self.frames_in as f64 * self.ratio).ceil() as u64;
        let mut output = Vec::new();
        while self.frames_out + (output.len() as u64) < expected {
            let needed = inner.input_frames_next();
            let mut chunk: Vec<f32> = self.pending.drain(..).collect();
            chunk.resize(needed, 0.0);
            let resampled = inner
                .process(&[chunk], None)
                .map_err(|e| EncoderError::Device(format!("Resampling failed: {}", e)))?;
            if resampled[0].is_empty() {
                break;
            }
            output.extend(resampled[0].iter().map(|&s| to_i16(s)));
        }
        output.truncate(expected.saturating_sub(self.frames_out) as usize);
        self.frames_out += output.len() as u64;
        Ok(output)
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}
