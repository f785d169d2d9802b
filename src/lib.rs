//! Sound Recorder - microphone recording sessions that survive their user interface
//!
//! A background resource owner holds the microphone and encoder while
//! session controllers come and go. Controllers reconcile with the owner
//! whenever they attach or hear from it, so a recording started in one
//! session can be stopped, played back and catalogued from another.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Session lifecycle, capacity arithmetic, value objects and errors
//! - **Application**: Resource owner, session controller, capacity monitor and port traits
//! - **Infrastructure**: Adapter implementations (cpal, rodio, FLAC, statvfs, notify-rust, etc.)
//! - **CLI**: Argument parsing, console and daemon runners, signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
