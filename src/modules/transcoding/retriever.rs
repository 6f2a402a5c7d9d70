use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::cleanup::ScratchSpace;
use super::error::TranscodeError;
use crate::infrastructure::crypto::{KeyRing, compression};
use crate::infrastructure::storage::{Device, StorageError};
use crate::modules::video::model::SourceFile;

/// Fetches a source file and restores its plaintext into scratch.
#[derive(Clone)]
pub struct SourceRetriever {
    device: Arc<dyn Device>,
    keys: KeyRing,
}

impl SourceRetriever {
    pub fn new(device: Arc<dyn Device>, keys: KeyRing) -> Self {
        Self { device, keys }
    }

    pub async fn retrieve(&self, file: &SourceFile, scratch: &ScratchSpace) -> Result<PathBuf, TranscodeError> {
        info!("⬇️ Downloading source {}", file.path);
        let data = self.device.read(&file.path).await.map_err(|e| match e {
            StorageError::NotFound(path) => TranscodeError::SourceNotFound(path),
            StorageError::Backend(msg) => TranscodeError::Storage(msg),
        })?;
        info!("⬇️ Downloaded {} bytes", data.len());

        let keys = self.keys.clone();
        let encryption = file.encryption.clone();
        let algorithm = file.compression.clone();
        let plain = tokio::task::spawn_blocking(move || {
            let mut data = data.to_vec();
            if let Some(params) = &encryption {
                data = keys.decrypt(&data, params)?;
            }
            if let Some(algorithm) = &algorithm {
                data = compression::decompress(&data, algorithm)?;
            }
            Ok::<_, TranscodeError>(data)
        })
        .await
        .map_err(|e| TranscodeError::Internal(format!("source decode task failed: {}", e)))??;

        let input = scratch.input_dir().join(basename(file));
        tokio::fs::write(&input, &plain).await?;
        Ok(input)
    }
}

fn basename(file: &SourceFile) -> String {
    Path::new(&file.path)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| file.id.clone())
}
