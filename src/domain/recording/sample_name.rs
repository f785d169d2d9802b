//! Recording base name value object

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::domain::error::InvalidSampleName;
use crate::domain::recording::OutputFormat;

/// Base name of a recording file, without extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleName(String);

impl SampleName {
    /// Default name derived from the wall-clock time, e.g. `recording-20240131-094512`
    pub fn generate(now: DateTime<Local>) -> Self {
        Self(format!("recording-{}", now.format("%Y%m%d-%H%M%S")))
    }

    /// Name of an existing recording file (its stem)
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name inside `dir` for the given format
    pub fn file_in(&self, dir: &Path, format: OutputFormat) -> PathBuf {
        dir.join(format!("{}{}", self.0, format.extension()))
    }
}

impl FromStr for SampleName {
    type Err = InvalidSampleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(InvalidSampleName {
                input: s.to_string(),
            });
        }
        Ok(Self(name.to_string()))
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
