//! In-memory repositories for the pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Bucket, RenditionJob, SourceFile};
use super::repository::{FileRepository, RenditionRepository, StoreError};

type UpdateFilter = Box<dyn Fn(&RenditionJob) -> bool + Send>;

#[derive(Default)]
pub struct MemoryRenditionRepository {
    records: Mutex<Vec<RenditionJob>>,
    /// Every record state ever written, in write order.
    pub writes: Mutex<Vec<RenditionJob>>,
    failing_update: Mutex<Option<UpdateFilter>>,
}

impl MemoryRenditionRepository {
    pub fn records(&self) -> Vec<RenditionJob> {
        self.records.lock().unwrap().clone()
    }

    pub fn history(&self, rendition_id: &str) -> Vec<RenditionJob> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.rendition_id == rendition_id)
            .cloned()
            .collect()
    }

    pub fn seed(&self, job: RenditionJob) {
        self.records.lock().unwrap().push(job);
    }

    /// The first update matching `filter` fails and is not stored.
    pub fn fail_update_once<F>(&self, filter: F)
    where
        F: Fn(&RenditionJob) -> bool + Send + 'static,
    {
        *self.failing_update.lock().unwrap() = Some(Box::new(filter));
    }
}

#[async_trait]
impl RenditionRepository for MemoryRenditionRepository {
    async fn find_for_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<RenditionJob>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.bucket_id == bucket_id && j.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn create(&self, job: &RenditionJob) -> Result<(), StoreError> {
        self.records.lock().unwrap().push(job.clone());
        self.writes.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn update(&self, job: &RenditionJob) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_update.lock().unwrap();
            if failing.as_ref().is_some_and(|hit| hit(job)) {
                failing.take();
                return Err(StoreError::Missing(job.id));
            }
        }

        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or(StoreError::Missing(job.id))?;
        *slot = job.clone();
        self.writes.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records.lock().unwrap().retain(|j| j.id != id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFileRepository {
    pub buckets: Mutex<Vec<Bucket>>,
    pub files: Mutex<Vec<SourceFile>>,
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn find_bucket(&self, bucket_id: &str) -> Result<Option<Bucket>, StoreError> {
        Ok(self.buckets.lock().unwrap().iter().find(|b| b.id == bucket_id).cloned())
    }

    async fn find_file(&self, bucket_id: &str, file_id: &str) -> Result<Option<SourceFile>, StoreError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.bucket_id == bucket_id && f.id == file_id)
            .cloned())
    }
}
