//! Output format and encoder settings

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::FormatParseError;

/// Capture rate for standard-quality recordings
pub const STANDARD_SAMPLE_RATE: u32 = 16_000;

/// Capture rate for high-quality recordings
pub const HIGH_SAMPLE_RATE: u32 = 44_100;

/// Every format is written as mono 16-bit PCM before any compression.
pub const BYTES_PER_SAMPLE: u32 = 2;

/// Container written for a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Wav,
    Flac,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [Self::Wav, Self::Flac];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// File extension including the leading dot
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Wav => ".wav",
            Self::Flac => ".flac",
        }
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
        }
    }

    /// Format implied by a file's extension, if any
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == ext)
    }

    /// Check whether `path` carries this format's extension
    pub fn matches(&self, path: &Path) -> bool {
        Self::from_path(path) == Some(*self)
    }
}

impl FromStr for OutputFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            _ => Err(FormatParseError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    #[default]
    Standard,
    High,
}

impl Quality {
    pub const fn from_high(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Standard
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        match self {
            Self::Standard => STANDARD_SAMPLE_RATE,
            Self::High => HIGH_SAMPLE_RATE,
        }
    }
}

/// What the encoder is asked to produce for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub format: OutputFormat,
    pub quality: Quality,
    pub path: PathBuf,
}

impl EncoderSettings {
    pub fn new(format: OutputFormat, quality: Quality, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            quality,
            path: path.into(),
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        self.quality.sample_rate()
    }

    /// Bytes written to storage per second of audio
    pub const fn byte_rate(&self) -> u64 {
        byte_rate(self.quality)
    }
}

/// Bytes per second of mono 16-bit PCM at the quality's sample rate
pub const fn byte_rate(quality: Quality) -> u64 {
    quality.sample_rate() as u64 * BYTES_PER_SAMPLE as u64
}
