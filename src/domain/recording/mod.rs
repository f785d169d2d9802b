//! Recording domain module

mod byte_size;
mod duration;
mod format;
mod sample_name;

pub use byte_size::ByteSize;
pub use duration::Duration;
pub use format::{
    byte_rate, EncoderSettings, OutputFormat, Quality, BYTES_PER_SAMPLE, HIGH_SAMPLE_RATE,
    STANDARD_SAMPLE_RATE,
};
pub use sample_name::SampleName;

/// Committed length of a finished recording: elapsed time rounded to the
/// nearest second, never less than one.
pub fn sample_length_secs(elapsed: std::time::Duration) -> u64 {
    let rounded = (elapsed.as_millis() + 500) / 1000;
    (rounded as u64).max(1)
}
