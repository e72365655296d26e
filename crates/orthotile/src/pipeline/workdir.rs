//! Per-job scratch directory.
//!
//! The directory holds the uploaded rasters, intermediates and the tile
//! tree. It is removed when the job reaches a terminal state: explicitly
//! through [`WorkDir::release`] on the normal paths, and from `Drop` if the
//! pipeline task unwinds.

use std::path::{Path, PathBuf};

pub struct WorkDir {
    path: PathBuf,
    released: bool,
}

impl WorkDir {
    /// Creates `root/name`, including missing parents.
    pub async fn create(root: &Path, name: &str) -> std::io::Result<Self> {
        let path = root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Removes the directory and everything in it.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => tracing::debug!("Removed working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove working directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove working directory {} on drop: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
