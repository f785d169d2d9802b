//! Wall-clock port

use std::time::SystemTime;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
