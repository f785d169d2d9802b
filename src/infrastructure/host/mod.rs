//! Host environment adapters

mod desktop;
mod sleep_inhibitor;

pub use desktop::DesktopHost;
pub use sleep_inhibitor::SleepInhibitor;
