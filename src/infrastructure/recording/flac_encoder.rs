//! FLAC output
//!
//! Recordings are captured as 16-bit mono PCM and compressed to FLAC
//! once capture stops.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;

use super::wav::read_pcm;

const BITS_PER_SAMPLE: usize = 16;
const CHANNELS: usize = 1;

/// FLAC encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("FLAC config error: {0}")]
    Config(String),

    #[error("FLAC encoding failed: {0}")]
    Encode(String),

    #[error("FLAC write failed: {0}")]
    Write(String),

    #[error("Cannot access recording: {0}")]
    Io(#[from] io::Error),
}

/// Encode mono i16 samples at `sample_rate` into a FLAC stream.
pub fn encode_to_flac(pcm_samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, EncodingError> {
    let samples_i32: Vec<i32> = pcm_samples.iter().map(|&s| s as i32).collect();

    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{:?}", e)))?;

    let source = MemSource::from_samples(
        &samples_i32,
        CHANNELS,
        BITS_PER_SAMPLE,
        sample_rate as usize,
    );

    let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{:?}", e)))?;

    let mut sink = ByteSink::new();
    flac_stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(e.to_string()))?;

    Ok(sink.into_inner())
}

/// Replace the PCM spool at `path` with its FLAC encoding.
///
/// The encoded stream goes to a sibling file first and is renamed over the
/// spool, so a failure leaves the PCM data in place.
pub fn compress_in_place(path: &Path) -> Result<u64, EncodingError> {
    let (sample_rate, samples) = read_pcm(path)?;
    let flac = encode_to_flac(&samples, sample_rate)?;

    let staging = staging_path(path);
    fs::write(&staging, &flac)?;
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(flac.len() as u64)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
