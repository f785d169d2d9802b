//! Sleep inhibition via systemd-inhibit
//!
//! The lock is a `systemd-inhibit ... sleep infinity` child process held
//! for the duration of a recording and killed on release.

use std::io;
use std::process::{Child, Command, Stdio};

use log::debug;

use crate::application::ports::{WakeLock, WakeLockError};

const INHIBIT_PROGRAM: &str = "systemd-inhibit";

pub struct SleepInhibitor {
    program: String,
    child: Option<Child>,
}

impl SleepInhibitor {
    pub fn new() -> Self {
        Self::with_program(INHIBIT_PROGRAM)
    }

    /// Use a different inhibitor binary with the same command line
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    pub fn is_held(&self) -> bool {
        self.child.is_some()
    }
}

impl Default for SleepInhibitor {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for SleepInhibitor {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args([
                "--what=sleep:idle",
                "--who=sound-recorder",
                "--why=Recording audio",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    WakeLockError::Unavailable
                } else {
                    WakeLockError::Failed(e.to_string())
                }
            })?;
        debug!("sleep inhibited by pid {}", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("sleep inhibitor released");
        }
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        self.release();
    }
}
