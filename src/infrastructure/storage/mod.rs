use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod s3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A storage device addressed by slash-separated paths under a root.
#[async_trait]
pub trait Device: Send + Sync {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn write(&self, path: &str, data: Bytes, mime: &str) -> Result<(), StorageError>;

    /// Removes every object at or below `path`. Missing paths are not an error.
    async fn delete_path(&self, path: &str) -> Result<(), StorageError>;

    fn root(&self) -> &str;

    fn path_for(&self, id: &str) -> String {
        join(self.root(), id)
    }
}

pub fn join(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", base, segment)
    }
}
