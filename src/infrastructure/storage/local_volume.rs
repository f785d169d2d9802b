//! Local filesystem volume

use std::io;
use std::path::{Path, PathBuf};

use crate::application::ports::{StorageVolume, VolumeStats};

/// The volume holding the recordings directory.
///
/// The directory itself may not exist yet; readiness and free space are
/// taken from its nearest existing ancestor.
pub struct LocalVolume {
    root: PathBuf,
}

impl LocalVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn existing_ancestor(&self) -> Option<&Path> {
        self.root.ancestors().find(|p| p.is_dir())
    }
}

#[cfg(unix)]
impl StorageVolume for LocalVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_ready(&self) -> bool {
        use nix::unistd::{access, AccessFlags};

        self.existing_ancestor()
            .is_some_and(|dir| access(dir, AccessFlags::W_OK | AccessFlags::X_OK).is_ok())
    }

    fn stats(&self) -> io::Result<VolumeStats> {
        let dir = self
            .existing_ancestor()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no mounted ancestor"))?;
        let stat = nix::sys::statvfs::statvfs(dir).map_err(io::Error::from)?;
        Ok(VolumeStats {
            available_blocks: stat.blocks_available() as u64,
            block_size: stat.fragment_size() as u64,
        })
    }
}

#[cfg(not(unix))]
impl StorageVolume for LocalVolume {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_ready(&self) -> bool {
        self.existing_ancestor().is_some()
    }

    fn stats(&self) -> io::Result<VolumeStats> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "free space is not available on this platform",
        ))
    }
}
