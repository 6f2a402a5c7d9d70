//! Runs one transcode job: resolve, purge, retrieve, probe, then the
//! rendition ladder, then scratch teardown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::adapter::EngineAdapter;
use super::cleanup::ScratchSpace;
use super::error::TranscodeError;
use super::playlist::MasterPlaylist;
use super::prober::MediaProber;
use super::publisher::OutputPublisher;
use super::retriever::SourceRetriever;
use crate::config::renditions::{RENDITIONS, RenditionSpec};
use crate::infrastructure::crypto::KeyRing;
use crate::infrastructure::media::{SourceInfo, TranscodeEngine};
use crate::infrastructure::storage::Device;
use crate::modules::video::events::TranscodeJob;
use crate::modules::video::model::RenditionJob;
use crate::modules::video::repository::{FileRepository, RenditionRepository, StoreError};
use crate::modules::video::state_store::{RenditionStateStore, RenditionTracker};

/// One ladder entry scheduled for a job.
#[derive(Debug, Clone, Copy)]
pub struct RenditionTask {
    pub index: usize,
    pub spec: RenditionSpec,
}

/// Result of one rendition: the published paths, or why it failed.
#[derive(Debug)]
pub struct RenditionOutcome {
    pub spec: RenditionSpec,
    pub result: Result<Vec<String>, TranscodeError>,
}

#[derive(Debug)]
pub struct JobReport {
    pub source: SourceInfo,
    pub renditions: Vec<RenditionOutcome>,
    /// Rendition records as stored when the ladder finished.
    pub records: Vec<RenditionJob>,
}

impl JobReport {
    pub fn ready_count(&self) -> usize {
        self.renditions.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.renditions.len() - self.ready_count()
    }
}

/// Everything a rendition needs from the job that owns it.
struct JobContext<'a> {
    bucket_id: &'a str,
    file_id: &'a str,
    input: &'a Path,
    source: &'a SourceInfo,
    scratch: &'a ScratchSpace,
}

#[derive(Clone)]
pub struct JobController {
    files: Arc<dyn FileRepository>,
    store: RenditionStateStore,
    retriever: SourceRetriever,
    prober: MediaProber,
    adapter: EngineAdapter,
    publisher: OutputPublisher,
    ladder: Vec<RenditionSpec>,
    scratch_base: PathBuf,
}

impl JobController {
    pub fn new(
        files: Arc<dyn FileRepository>,
        renditions: Arc<dyn RenditionRepository>,
        engine: Arc<dyn TranscodeEngine>,
        source_device: Arc<dyn Device>,
        video_device: Arc<dyn Device>,
        keys: KeyRing,
        scratch_base: PathBuf,
    ) -> Self {
        Self {
            files,
            store: RenditionStateStore::new(renditions),
            retriever: SourceRetriever::new(source_device, keys),
            prober: MediaProber::new(engine.clone()),
            adapter: EngineAdapter::new(engine),
            publisher: OutputPublisher::new(video_device),
            ladder: RENDITIONS.to_vec(),
            scratch_base,
        }
    }

    #[cfg(test)]
    pub fn with_ladder(mut self, ladder: Vec<RenditionSpec>) -> Self {
        self.ladder = ladder;
        self
    }

    /// Current rendition records of a file.
    pub async fn renditions(&self, bucket_id: &str, file_id: &str) -> Result<Vec<RenditionJob>, StoreError> {
        self.store.list(bucket_id, file_id).await
    }

    /// Runs the whole job. The scratch root is gone when this returns,
    /// whatever the outcome.
    pub async fn run(&self, job: &TranscodeJob) -> Result<JobReport, TranscodeError> {
        validate_id("bucketId", &job.bucket_id)?;
        validate_id("fileId", &job.file_id)?;

        let scratch = ScratchSpace::create(&self.scratch_base, &job.bucket_id, &job.file_id).await?;
        let result = self.execute(job, &scratch).await;

        let root = scratch.root().to_path_buf();
        if let Err(e) = scratch.cleanup().await {
            warn!(file_id = %job.file_id, "Failed to remove scratch {}: {}", root.display(), e);
        }
        result
    }

    async fn execute(&self, job: &TranscodeJob, scratch: &ScratchSpace) -> Result<JobReport, TranscodeError> {
        let bucket = self
            .files
            .find_bucket(&job.bucket_id)
            .await?
            .filter(|b| b.enabled)
            .ok_or_else(|| TranscodeError::SourceNotFound(format!("bucket {}", job.bucket_id)))?;
        // files carry no enabled flag of their own
        let file = self
            .files
            .find_file(&bucket.id, &job.file_id)
            .await?
            .ok_or_else(|| TranscodeError::SourceNotFound(format!("file {}/{}", bucket.id, job.file_id)))?;

        let purged = self.store.purge(&bucket.id, &file.id).await?;
        self.publisher.purge(&bucket.id, &file.id).await?;
        info!(bucket_id = %bucket.id, file_id = %file.id, "🗑️ Cleared {} previous renditions", purged);

        let input = self.retriever.retrieve(&file, scratch).await?;
        let source = self.prober.probe(&input).await?;

        let ctx = JobContext {
            bucket_id: &bucket.id,
            file_id: &file.id,
            input: &input,
            source: &source,
            scratch,
        };
        let mut playlist = MasterPlaylist::new(&file.id);
        let mut renditions = Vec::with_capacity(self.ladder.len());
        for task in self.plan() {
            renditions.push(self.run_rendition(&ctx, task, &mut playlist).await?);
        }

        let records = self.store.list(&bucket.id, &file.id).await?;
        Ok(JobReport {
            source,
            renditions,
            records,
        })
    }

    fn plan(&self) -> Vec<RenditionTask> {
        self.ladder
            .iter()
            .enumerate()
            .map(|(index, spec)| RenditionTask { index, spec: *spec })
            .collect()
    }

    /// Any failure inside a rendition is recorded on its record and the
    /// ladder moves on. The job only ends here when the store cannot take
    /// the Error transition either.
    async fn run_rendition(
        &self,
        ctx: &JobContext<'_>,
        task: RenditionTask,
        playlist: &mut MasterPlaylist,
    ) -> Result<RenditionOutcome, TranscodeError> {
        let mut tracker = match self.store.create(ctx.bucket_id, ctx.file_id, &task.spec).await {
            Ok(tracker) => tracker,
            Err(e) => {
                warn!(rendition_id = %task.spec.id, "⚠️ Could not create rendition {}: {}", task.spec.name, e);
                return Ok(RenditionOutcome {
                    spec: task.spec,
                    result: Err(e.into()),
                });
            }
        };
        info!(rendition_id = %task.spec.id, "🎬 Transcoding {}", task.spec.name);

        let err = match self.produce(ctx, &task, playlist, &mut tracker).await {
            Ok(published) => {
                info!(rendition_id = %task.spec.id, "✅ Rendition {} ready", task.spec.name);
                return Ok(RenditionOutcome {
                    spec: task.spec,
                    result: Ok(published),
                });
            }
            Err(err) => err,
        };

        warn!(
            rendition_id = %task.spec.id,
            code = err.code(),
            "⚠️ Rendition {} failed while {}: {}", task.spec.name, tracker.status(), err
        );
        tracker.fail(err.to_metadata()).await?;

        Ok(RenditionOutcome {
            spec: task.spec,
            result: Err(err),
        })
    }

    async fn produce(
        &self,
        ctx: &JobContext<'_>,
        task: &RenditionTask,
        playlist: &mut MasterPlaylist,
        tracker: &mut RenditionTracker,
    ) -> Result<Vec<String>, TranscodeError> {
        tracker.start().await?;

        let request = EngineAdapter::request_for(&task.spec, ctx.file_id, ctx.scratch.output_dir(), ctx.source);
        let mut output = self.adapter.encode(ctx.input, &request, tracker).await?;

        playlist.push(task.index, task.spec);
        let master = playlist
            .write(ctx.scratch.output_dir())
            .await
            .map_err(|e| TranscodeError::Encode(format!("cannot write master playlist: {}", e)))?;
        output.artifacts.push(master);

        self.publisher
            .publish(ctx.bucket_id, ctx.file_id, &output.artifacts, tracker)
            .await
    }
}

/// Ids end up in scratch and storage paths.
fn validate_id(field: &str, value: &str) -> Result<(), TranscodeError> {
    let valid = !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(TranscodeError::InvalidRequest(format!("{} {:?} is not a valid id", field, value)))
    }
}
