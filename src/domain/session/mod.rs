//! Recording session domain module

mod advisory;
mod command_guard;
mod lifecycle;
mod state;

pub use advisory::Advisory;
pub use command_guard::{CommandGuard, Control, MIN_COMMAND_INTERVAL, STOP_COMMAND_INTERVAL};
pub use lifecycle::{InvalidStateTransition, Session};
pub use state::SessionState;
