//! Owns the rendition state machine. Every status, progress and metadata
//! change of a rendition record goes through a [`RenditionTracker`].

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use super::model::{RenditionJob, RenditionStatus};
use super::repository::{RenditionRepository, StoreError};
use crate::config::renditions::RenditionSpec;

#[derive(Clone)]
pub struct RenditionStateStore {
    repo: Arc<dyn RenditionRepository>,
}

impl RenditionStateStore {
    pub fn new(repo: Arc<dyn RenditionRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, bucket_id: &str, file_id: &str) -> Result<Vec<RenditionJob>, StoreError> {
        self.repo.find_for_file(bucket_id, file_id).await
    }

    /// Deletes every record of a file. Returns how many were removed.
    pub async fn purge(&self, bucket_id: &str, file_id: &str) -> Result<usize, StoreError> {
        let existing = self.repo.find_for_file(bucket_id, file_id).await?;
        for job in &existing {
            self.repo.delete(job.id).await?;
        }
        Ok(existing.len())
    }

    /// Inserts a fresh record in Created.
    pub async fn create(
        &self,
        bucket_id: &str,
        file_id: &str,
        spec: &RenditionSpec,
    ) -> Result<RenditionTracker, StoreError> {
        let job = RenditionJob::new(bucket_id, file_id, spec.id, spec.name);
        self.repo.create(&job).await?;
        Ok(RenditionTracker {
            repo: self.repo.clone(),
            job,
        })
    }

    #[cfg(test)]
    pub async fn open(
        &self,
        bucket_id: &str,
        file_id: &str,
        spec: &RenditionSpec,
    ) -> Result<RenditionTracker, StoreError> {
        let mut tracker = self.create(bucket_id, file_id, spec).await?;
        tracker.start().await?;
        Ok(tracker)
    }
}

/// Handle on one live rendition record.
pub struct RenditionTracker {
    repo: Arc<dyn RenditionRepository>,
    job: RenditionJob,
}

impl RenditionTracker {
    pub fn job(&self) -> &RenditionJob {
        &self.job
    }

    pub fn status(&self) -> RenditionStatus {
        self.job.status
    }

    pub async fn start(&mut self) -> Result<(), StoreError> {
        self.advance_with(RenditionStatus::TranscodingStarted, |job| {
            job.time_started = Some(OffsetDateTime::now_utc());
        })
        .await
    }

    async fn advance(&mut self, next: RenditionStatus) -> Result<(), StoreError> {
        self.advance_with(next, |_| {}).await
    }

    async fn advance_with<F>(&mut self, next: RenditionStatus, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut RenditionJob),
    {
        let from = self.job.status;
        if !from.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { from, to: next });
        }

        let mut staged = self.job.clone();
        edit(&mut staged);
        staged.status = next;
        self.commit(staged).await?;
        debug!(
            rendition_id = %self.job.rendition_id,
            "rendition {} -> {}", from, next
        );
        Ok(())
    }

    async fn commit(&mut self, staged: RenditionJob) -> Result<(), StoreError> {
        self.repo.update(&staged).await?;
        self.job = staged;
        Ok(())
    }

    /// Persists progress while transcoding. Values below the last persisted
    /// one are dropped; returns whether a write happened.
    pub async fn record_progress(&mut self, percent: u8) -> Result<bool, StoreError> {
        if self.job.status != RenditionStatus::TranscodingStarted {
            return Err(StoreError::InvalidTransition {
                from: self.job.status,
                to: RenditionStatus::TranscodingStarted,
            });
        }
        let percent = percent.min(100);
        if percent < self.job.progress {
            return Ok(false);
        }

        let mut staged = self.job.clone();
        staged.progress = percent;
        self.commit(staged).await?;
        Ok(true)
    }

    pub async fn transcoding_ended(&mut self, metadata: Value) -> Result<(), StoreError> {
        self.advance_with(RenditionStatus::TranscodingEnded, |job| {
            job.metadata = Some(metadata);
            job.time_ended = Some(OffsetDateTime::now_utc());
        })
        .await
    }

    pub async fn uploading(&mut self) -> Result<(), StoreError> {
        self.advance(RenditionStatus::Uploading).await
    }

    pub async fn ready(&mut self) -> Result<(), StoreError> {
        self.advance(RenditionStatus::Ready).await
    }

    /// Stores the `{code, message}` payload and moves the rendition to Error.
    pub async fn fail(&mut self, error: Value) -> Result<(), StoreError> {
        self.advance_with(RenditionStatus::Error, |job| job.metadata = Some(error))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::renditions::RENDITIONS;
    use crate::modules::video::memory::MemoryRenditionRepository;

    fn store() -> (Arc<MemoryRenditionRepository>, RenditionStateStore) {
        let repo = Arc::new(MemoryRenditionRepository::default());
        (repo.clone(), RenditionStateStore::new(repo))
    }

    #[tokio::test]
    async fn open_creates_then_starts() {
        let (repo, store) = store();
        let tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();

        assert_eq!(tracker.status(), RenditionStatus::TranscodingStarted);
        assert!(tracker.job().time_started.is_some());

        let history: Vec<_> = repo.history(RENDITIONS[0].id).iter().map(|j| j.status).collect();
        assert_eq!(
            history,
            vec![RenditionStatus::Created, RenditionStatus::TranscodingStarted]
        );
    }

    #[tokio::test]
    async fn progress_never_goes_backwards() {
        let (repo, store) = store();
        let mut tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();

        assert!(tracker.record_progress(30).await.unwrap());
        assert!(!tracker.record_progress(12).await.unwrap());
        assert!(tracker.record_progress(30).await.unwrap());
        assert_eq!(repo.records()[0].progress, 30);
    }

    #[tokio::test]
    async fn progress_rejected_after_transcoding_ended() {
        let (_, store) = store();
        let mut tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        tracker.transcoding_ended(serde_json::json!({})).await.unwrap();

        assert!(matches!(
            tracker.record_progress(99).await,
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn terminal_records_are_frozen() {
        let (_, store) = store();
        let mut tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        tracker
            .fail(serde_json::json!({ "code": "encode_error", "message": "boom" }))
            .await
            .unwrap();

        assert!(tracker.ready().await.is_err());
        assert!(tracker.fail(serde_json::json!({})).await.is_err());
        assert_eq!(
            tracker.job().metadata,
            Some(serde_json::json!({"code": "encode_error", "message": "boom"}))
        );
    }

    #[tokio::test]
    async fn cannot_skip_back_to_uploading_after_ready() {
        let (_, store) = store();
        let mut tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        tracker.transcoding_ended(serde_json::json!({})).await.unwrap();
        tracker.uploading().await.unwrap();
        tracker.ready().await.unwrap();

        assert!(tracker.uploading().await.is_err());
        assert_eq!(tracker.status(), RenditionStatus::Ready);
    }

    #[tokio::test]
    async fn created_record_can_fail_before_starting() {
        let (repo, store) = store();
        let mut tracker = store.create("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        assert_eq!(tracker.status(), RenditionStatus::Created);
        assert!(tracker.job().time_started.is_none());

        tracker
            .fail(serde_json::json!({ "code": "store_error", "message": "down" }))
            .await
            .unwrap();

        assert_eq!(repo.records()[0].status, RenditionStatus::Error);
    }

    #[tokio::test]
    async fn failed_write_leaves_tracker_unchanged() {
        let (repo, store) = store();
        let mut tracker = store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        repo.fail_update_once(|job| job.status == RenditionStatus::TranscodingEnded);

        assert!(tracker.transcoding_ended(serde_json::json!({})).await.is_err());
        assert_eq!(tracker.status(), RenditionStatus::TranscodingStarted);
        assert!(tracker.fail(serde_json::json!({})).await.is_ok());
        assert_eq!(repo.records()[0].status, RenditionStatus::Error);
    }

    #[tokio::test]
    async fn purge_removes_only_that_file() {
        let (repo, store) = store();
        store.open("bucket", "abc", &RENDITIONS[0]).await.unwrap();
        store.open("bucket", "abc", &RENDITIONS[1]).await.unwrap();
        store.open("bucket", "other", &RENDITIONS[0]).await.unwrap();

        assert_eq!(store.purge("bucket", "abc").await.unwrap(), 2);
        assert_eq!(store.purge("bucket", "abc").await.unwrap(), 0);
        assert_eq!(repo.records().len(), 1);
    }
}
