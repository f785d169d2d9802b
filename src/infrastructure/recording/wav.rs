//! 16-bit mono WAV spool
//!
//! hound writes the header when the spool is created and rewrites its size
//! fields on every flush, so a file cut short by a crash still reads back
//! up to the last flush.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};

/// Format of every spool the recorder writes
pub fn spool_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Append-only WAV file that captured audio is streamed into
pub struct WavSpool {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl WavSpool {
    /// Create (or truncate) `path` with an empty data chunk.
    pub fn create(path: &Path, sample_rate: u32) -> io::Result<Self> {
        let mut writer =
            hound::WavWriter::create(path, spool_spec(sample_rate)).map_err(into_io)?;
        writer.flush().map_err(into_io)?;
        Ok(Self { writer })
    }

    pub fn sample_rate(&self) -> u32 {
        self.writer.spec().sample_rate
    }

    /// Append samples and push them to disk so the file size tracks
    /// what has been captured.
    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        for &sample in samples {
            self.writer.write_sample(sample).map_err(into_io)?;
        }
        self.writer.flush().map_err(into_io)
    }

    /// Close the spool. Returns the size of the sample data in bytes.
    pub fn finalize(self) -> io::Result<u64> {
        let data_bytes = u64::from(self.writer.len()) * 2;
        self.writer.finalize().map_err(into_io)?;
        Ok(data_bytes)
    }
}

/// Read back the samples of a spool together with its sample rate.
pub fn read_pcm(path: &Path) -> io::Result<(u32, Vec<i16>)> {
    let reader = WavReader::open(path).map_err(into_io)?;
    let sample_rate = reader.spec().sample_rate;
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(into_io)?;
    Ok((sample_rate, samples))
}

fn into_io(e: hound::Error) -> io::Error {
    match e {
        hound::Error::IoError(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
