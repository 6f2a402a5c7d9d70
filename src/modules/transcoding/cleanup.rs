//! Per-job scratch area: `<base>/<bucketId>/<fileId>/{in,out}`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub struct ScratchSpace {
    root: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
    removed: bool,
}

impl ScratchSpace {
    /// A root left behind by a killed run is removed first.
    pub async fn create(base: &Path, bucket_id: &str, file_id: &str) -> io::Result<Self> {
        let root = base.join(bucket_id).join(file_id);
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => warn!("Removed stale scratch {}", root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let space = Self {
            input_dir: root.join("in"),
            output_dir: root.join("out"),
            root,
            removed: false,
        };

        // dropping `space` on failure removes whatever was created
        tokio::fs::create_dir_all(&space.input_dir).await?;
        tokio::fs::create_dir_all(&space.output_dir).await?;
        Ok(space)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Recursively removes the scratch root. Already-missing roots are fine.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!("🧹 Removed scratch {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove scratch {}: {}", self.root.display(), e);
            }
        }
    }
}
