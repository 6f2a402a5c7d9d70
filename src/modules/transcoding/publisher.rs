use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use super::error::TranscodeError;
use crate::infrastructure::media::{Artifact, ArtifactRole};
use crate::infrastructure::storage::{Device, join};
use crate::modules::video::state_store::RenditionTracker;

/// Moves finished artifacts from scratch into durable video storage.
#[derive(Clone)]
pub struct OutputPublisher {
    device: Arc<dyn Device>,
}

impl OutputPublisher {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self { device }
    }

    /// `<videoRoot>/<bucketId>/<fileId>`
    pub fn destination_dir(&self, bucket_id: &str, file_id: &str) -> String {
        let path = self.device.path_for(file_id);
        let root = self.device.root();
        match path.strip_prefix(root) {
            Some(rest) if !root.is_empty() => join(&join(root, bucket_id), rest),
            _ => join(bucket_id, &path),
        }
    }

    /// Removes everything a previous run published for this file.
    pub async fn purge(&self, bucket_id: &str, file_id: &str) -> Result<(), TranscodeError> {
        let dir = self.destination_dir(bucket_id, file_id);
        self.device
            .delete_path(&dir)
            .await
            .map_err(|e| TranscodeError::Storage(e.to_string()))
    }

    /// Uploads every non-sidecar artifact in order, deleting each scratch copy
    /// once it is stored. Returns the destination paths.
    pub async fn publish(
        &self,
        bucket_id: &str,
        file_id: &str,
        artifacts: &[Artifact],
        tracker: &mut RenditionTracker,
    ) -> Result<Vec<String>, TranscodeError> {
        let dir = self.destination_dir(bucket_id, file_id);
        let mut published = Vec::new();

        for artifact in artifacts.iter().filter(|a| a.role != ArtifactRole::Sidecar) {
            let name = artifact.file_name().ok_or_else(|| {
                TranscodeError::Upload(format!("artifact without a file name: {}", artifact.path.display()))
            })?;
            let destination = join(&dir, name);

            let data = tokio::fs::read(&artifact.path).await.map_err(|e| {
                TranscodeError::Upload(format!("cannot read {}: {}", artifact.path.display(), e))
            })?;
            self.device
                .write(&destination, Bytes::from(data), &artifact.mime)
                .await
                .map_err(|e| TranscodeError::Upload(e.to_string()))?;

            if published.is_empty() {
                tracker.uploading().await?;
            }
            if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
                warn!("Could not remove uploaded scratch file {}: {}", artifact.path.display(), e);
            }
            published.push(destination);
        }

        tracker.ready().await?;
        info!(
            rendition_id = %tracker.job().rendition_id,
            "⬆️ Published {} files to {}", published.len(), dir
        );
        Ok(published)
    }
}
