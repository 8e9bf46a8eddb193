use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Uniquely named directory under the system temp dir, removed with
/// everything in it when dropped. Removal failures are logged only.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new() -> io::Result<Self> {
        Self::new_in(&std::env::temp_dir())
    }

    pub fn new_in(parent: &Path) -> io::Result<Self> {
        let path = parent.join(format!("drive-bot-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path)?;
        debug!("created scratch dir {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("removed scratch dir {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove scratch dir {}: {}", self.path.display(), e),
        }
    }
}
