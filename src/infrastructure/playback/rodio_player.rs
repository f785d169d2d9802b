//! Playback through rodio
//!
//! rodio's `OutputStream` is not Send, so it is opened on a parked thread
//! that lives as long as the player; the player itself only holds the
//! stream handle and the sink.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::debug;
use rodio::{Decoder, OutputStreamHandle, Sink, Source};

use crate::application::ports::{AudioPlayer, PlaybackError};

struct Output {
    handle: OutputStreamHandle,
    /// Dropping this lets the output thread exit
    _shutdown: mpsc::Sender<()>,
}

impl Output {
    fn open() -> Result<Self, PlaybackError> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match rodio::OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    let _ = shutdown_rx.recv();
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(PlaybackError::Device(e.to_string())));
                }
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        let handle = handle_rx
            .recv()
            .map_err(|_| PlaybackError::Device("audio output thread exited".into()))??;
        Ok(Self {
            handle,
            _shutdown: shutdown_tx,
        })
    }
}

/// [`AudioPlayer`] on the default output device
#[derive(Default)]
pub struct RodioPlayer {
    output: Option<Output>,
    sink: Option<Sink>,
    duration: Option<Duration>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn output(&mut self) -> Result<&OutputStreamHandle, PlaybackError> {
        if self.output.is_none() {
            self.output = Some(Output::open()?);
        }
        self.output
            .as_ref()
            .map(|o| &o.handle)
            .ok_or_else(|| PlaybackError::Device("no audio output".into()))
    }

    fn sink(&self) -> Result<&Sink, PlaybackError> {
        self.sink.as_ref().ok_or(PlaybackError::NotLoaded)
    }
}

fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>, PlaybackError> {
    let file = File::open(path).map_err(|e| PlaybackError::Storage(describe(path, &e)))?;
    Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode(e.to_string()))
}

fn describe(path: &Path, e: &io::Error) -> String {
    format!("{}: {}", path.display(), e)
}

impl AudioPlayer for RodioPlayer {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.stop();
        let source = open_source(path)?;
        let duration = source.total_duration();

        let sink = Sink::try_new(self.output()?).map_err(|e| PlaybackError::Device(e.to_string()))?;
        sink.pause();
        sink.append(source);
        debug!("loaded {} ({:?})", path.display(), duration);

        self.sink = Some(sink);
        self.duration = duration;
        Ok(())
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        self.sink()?.play();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.sink()?.pause();
        Ok(())
    }

    fn seek(&mut self, fraction: f32) -> Result<(), PlaybackError> {
        let sink = self.sink()?;
        let Some(duration) = self.duration else {
            return Ok(());
        };
        let target = duration.mul_f32(fraction.clamp(0.0, 1.0));
        sink.try_seek(target)
            .map_err(|e| PlaybackError::Decode(e.to_string()))
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.duration = None;
    }

    fn position_secs(&self) -> f64 {
        self.sink
            .as_ref()
            .map_or(0.0, |sink| sink.get_pos().as_secs_f64())
    }

    fn duration_secs(&self) -> f64 {
        self.duration.map_or(0.0, |d| d.as_secs_f64())
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().is_some_and(Sink::empty)
    }
}
