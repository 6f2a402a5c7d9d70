use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{Device, StorageError};

/// In-process device used by the pipeline tests.
#[derive(Default)]
pub struct MemoryDevice {
    root: String,
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    fail_writes: Mutex<bool>,
}

impl MemoryDevice {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Default::default()
        }
    }

    pub fn insert(&self, path: &str, data: impl Into<Bytes>, mime: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.into(), mime.to_string()));
    }

    pub fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn remove(&self, path: &str) {
        self.objects.lock().unwrap().remove(path);
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Device for MemoryDevice {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        self.get(path)
            .map(|(data, _)| data)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, data: Bytes, mime: &str) -> Result<(), StorageError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StorageError::Backend(format!("write refused: {}", path)));
        }
        self.insert(path, data, mime);
        Ok(())
    }

    async fn delete_path(&self, path: &str) -> Result<(), StorageError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.objects
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    fn root(&self) -> &str {
        &self.root
    }
}
