//! Byte size value object

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ByteSizeParseError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// A positive number of bytes, parsed from strings like "500k" or "10MB".
/// Units are binary (1k = 1024 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ByteSizeParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();
        let split = input
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(input.len());
        let (digits, unit) = input.split_at(split);

        if digits.is_empty() {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;

        let multiplier = match unit.trim() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            _ => return Err(invalid()),
        };

        match value.checked_mul(multiplier) {
            Some(bytes) if bytes > 0 => Ok(Self(bytes)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes >= GIB && bytes % GIB == 0 {
            write!(f, "{}GB", bytes / GIB)
        } else if bytes >= MIB && bytes % MIB == 0 {
            write!(f, "{}MB", bytes / MIB)
        } else if bytes >= KIB && bytes % KIB == 0 {
            write!(f, "{}KB", bytes / KIB)
        } else {
            write!(f, "{}B", bytes)
        }
    }
}
