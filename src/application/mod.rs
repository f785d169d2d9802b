//! Application layer - Use cases and port interfaces
//!
//! The resource owner runs the recording; session controllers drive it
//! on behalf of a user interface and talk to it through a handle and the
//! notification channel.

pub mod broadcast;
pub mod capacity;
pub mod controller;
pub mod ports;
pub mod resource_owner;

#[cfg(test)]
mod test_support;

pub use broadcast::{NotificationChannel, RecorderEvent, Subscription};
pub use capacity::CapacityMonitor;
pub use controller::{
    BackOutcome, CommandOutcome, ControllerConfig, ControllerMode, ControllerPorts,
    SessionController, SessionView,
};
pub use resource_owner::{
    CompletedRecording, OwnerCommand, OwnerConfig, OwnerPorts, OwnerStatus, Preemption,
    ResourceOwner, ResourceOwnerHandle, StartRequest, MONITOR_INTERVAL,
};
