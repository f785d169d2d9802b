//! PID file management for daemon mode

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use super::socket::runtime_file;

const PID_FILE_NAME: &str = "sound-recorder.pid";

/// PID file for daemon mode
pub struct PidFile {
    path: PathBuf,
    owned: bool,
}

impl PidFile {
    /// PID file in the runtime directory
    pub fn new() -> Self {
        Self::with_path(runtime_file(PID_FILE_NAME))
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
        }
    }

    /// Get the PID file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of a live daemon recorded in the file. A stale file is removed.
    pub fn is_running(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.path).ok()?;
        let pid: u32 = contents.trim().parse().ok()?;

        // Signal 0 checks for existence without delivering anything.
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Some(pid),
            Err(Errno::ESRCH) => {
                let _ = fs::remove_file(&self.path);
                None
            }
            Err(Errno::EPERM) => Some(pid),
            Err(_) => None,
        }
    }

    /// Acquire the PID file (fails if another daemon is running)
    pub fn acquire(&mut self) -> Result<(), PidFileError> {
        if let Some(pid) = self.is_running() {
            return Err(PidFileError::AlreadyRunning(pid));
        }

        fs::write(&self.path, process::id().to_string())
            .map_err(|e| PidFileError::WriteFailed(e.to_string()))?;
        self.owned = true;
        Ok(())
    }

    /// Release the PID file if this process wrote it
    pub fn release(&mut self) -> Result<(), PidFileError> {
        if self.owned && self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| PidFileError::RemoveFailed(e.to_string()))?;
        }
        self.owned = false;
        Ok(())
    }
}

impl Default for PidFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// PID file errors
#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    #[error("Another daemon is already running (PID: {0})")]
    AlreadyRunning(u32),

    #[error("Failed to write PID file: {0}")]
    WriteFailed(String),

    #[error("Failed to remove PID file: {0}")]
    RemoveFailed(String),
}
