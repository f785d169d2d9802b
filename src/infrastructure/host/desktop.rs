//! Desktop host

use std::sync::atomic::{AtomicBool, Ordering};

use crate::application::ports::HostEnvironment;

/// Host without telephony. A call can be flagged by hand, e.g. when a
/// softphone takes over the audio path.
#[derive(Debug, Default)]
pub struct DesktopHost {
    in_call: AtomicBool,
}

impl DesktopHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_in_call(&self, in_call: bool) {
        self.in_call.store(in_call, Ordering::SeqCst);
    }
}

impl HostEnvironment for DesktopHost {
    fn in_call(&self) -> bool {
        self.in_call.load(Ordering::SeqCst)
    }
}
