//! Duration value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::capacity::DEFAULT_LOW_STORAGE_THRESHOLD_SECS;
use crate::domain::error::DurationParseError;

/// Value object representing a time span given in hours, minutes and seconds.
/// Immutable and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration {
    seconds: u64,
}

impl Duration {
    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self { seconds: secs }
    }

    /// Remaining recording time below which storage is reported as low
    pub const fn default_low_storage_threshold() -> Self {
        Self::from_secs(DEFAULT_LOW_STORAGE_THRESHOLD_SECS)
    }

    /// Get duration in seconds
    pub const fn as_secs(&self) -> u64 {
        self.seconds
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_secs(self.seconds)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse strings such as "45s", "30m", "1h", "1h30m" or "2m30s".
    /// Units must appear in descending order, each at most once.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();

        let mut total: u64 = 0;
        let mut digits = String::new();
        let mut last_unit_rank = 0;

        for ch in input.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }

            let (rank, multiplier) = match ch {
                'h' => (3, 3600),
                'm' => (2, 60),
                's' => (1, 1),
                _ => return Err(invalid()),
            };
            if digits.is_empty() || (last_unit_rank != 0 && rank >= last_unit_rank) {
                return Err(invalid());
            }

            let value: u64 = digits.parse().map_err(|_| invalid())?;
            total = value
                .checked_mul(multiplier)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
            digits.clear();
            last_unit_rank = rank;
        }

        if !digits.is_empty() || last_unit_rank == 0 || total == 0 {
            return Err(invalid());
        }

        Ok(Self { seconds: total })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;

        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        if seconds > 0 || self.seconds == 0 {
            write!(f, "{}s", seconds)?;
        }
        Ok(())
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::default_low_storage_threshold()
    }
}
