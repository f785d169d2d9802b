//! Configuration adapters

mod xdg;

pub use xdg::{XdgConfigStore, CONFIG_DIR_NAME};
