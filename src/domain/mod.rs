//! Domain layer - Core business logic
//!
//! Contains value objects, the recording session entity, capacity limits
//! and domain errors. This layer has no dependencies on external systems.

pub mod capacity;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use capacity::{CapacityLimit, LimitKind, NO_LIMIT_SECS};
pub use config::AppConfig;
pub use error::*;
pub use recording::{ByteSize, Duration, EncoderSettings, OutputFormat, Quality, SampleName};
pub use session::{Advisory, CommandGuard, Control, Session, SessionState};
