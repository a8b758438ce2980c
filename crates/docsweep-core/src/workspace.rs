//! Per-run working directory with guaranteed cleanup

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Owns a working directory path and removes it when dropped.
///
/// The directory itself is not created here; the archive expander does that.
/// Dropping the guard (normal return, error, panic or a cancelled future)
/// removes whatever exists at the path.
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
    armed: bool,
}

impl WorkingDir {
    /// Guard an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Guard a fresh `run-<uuid>` path under `parent`
    pub fn unique_in(parent: &Path) -> Self {
        Self::new(parent.join(format!("run-{}", Uuid::new_v4())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete anything already at the path
    pub fn clear(&self) -> Result<()> {
        remove_tree(&self.path)
    }

    /// Delete the directory now and disarm the drop guard
    pub fn remove(mut self) -> Result<()> {
        self.armed = false;
        remove_tree(&self.path)
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = remove_tree(&self.path) {
            warn!("Failed to remove working directory: {}", e);
        }
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed working directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::storage(path, e)),
    }
}
