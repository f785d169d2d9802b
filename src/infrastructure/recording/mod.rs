//! Recording infrastructure module
//!
//! Captures from the default input device with cpal and writes 16-bit mono
//! PCM, compressing to FLAC when that format was requested.

mod cpal_encoder;
mod flac_encoder;
pub mod wav;

pub use cpal_encoder::{CpalEncoder, FLUSH_INTERVAL};
pub use flac_encoder::{compress_in_place, encode_to_flac, EncodingError};

/// Create the encoder for the current platform
pub fn create_encoder() -> CpalEncoder {
    CpalEncoder::new()
}
