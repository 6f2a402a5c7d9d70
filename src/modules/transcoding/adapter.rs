//! Drives the external engine for one rendition and feeds its progress
//! into the rendition record.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::error::TranscodeError;
use crate::config::renditions::RenditionSpec;
use crate::infrastructure::media::{
    ArtifactRole, EncodeOutput, EncodeRequest, SourceInfo, TranscodeEngine,
};
use crate::modules::video::repository::StoreError;
use crate::modules::video::state_store::RenditionTracker;

pub const SEGMENT_SECONDS: u32 = 10;
/// Only progress values divisible by this are persisted.
pub const PROGRESS_STEP: u8 = 3;
const PROGRESS_BUFFER: usize = 32;

/// Decides which engine progress reports reach the store.
#[derive(Debug, Default)]
pub struct ProgressGate {
    last: Option<u8>,
}

impl ProgressGate {
    pub fn admit(&mut self, percent: u8) -> bool {
        if percent % PROGRESS_STEP != 0 {
            return false;
        }
        if self.last.is_some_and(|last| percent <= last) {
            return false;
        }
        self.last = Some(percent);
        true
    }
}

#[derive(Clone)]
pub struct EngineAdapter {
    engine: Arc<dyn TranscodeEngine>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn TranscodeEngine>) -> Self {
        Self { engine }
    }

    pub fn request_for(spec: &RenditionSpec, file_id: &str, output_dir: &Path, source: &SourceInfo) -> EncodeRequest {
        EncodeRequest {
            width: spec.width,
            height: spec.height,
            video_kbps: spec.video_bitrate,
            audio_kbps: spec.audio_bitrate,
            segment_seconds: SEGMENT_SECONDS,
            allow_cache: false,
            output_dir: output_dir.to_path_buf(),
            output_name: format!("{}_{}p", file_id, spec.height),
            source_duration: (source.duration > 0.0).then_some(source.duration),
        }
    }

    /// Runs the engine to completion, then records the achieved metadata
    /// and moves the rendition to TranscodingEnded.
    pub async fn encode(
        &self,
        input: &Path,
        request: &EncodeRequest,
        tracker: &mut RenditionTracker,
    ) -> Result<EncodeOutput, TranscodeError> {
        let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
        let progress_tracker = &mut *tracker;

        let encode = self.engine.transcode(input, request, tx);
        let persist = async move {
            let mut gate = ProgressGate::default();
            while let Some(event) = rx.recv().await {
                if gate.admit(event.percent) {
                    progress_tracker.record_progress(event.percent).await?;
                }
            }
            Ok::<_, StoreError>(())
        };

        let (encoded, persisted) = tokio::join!(encode, persist);
        let output = encoded.map_err(|e| TranscodeError::Encode(e.to_string()))?;
        persisted?;

        if !output.artifacts.iter().any(|a| a.role != ArtifactRole::Sidecar) {
            return Err(TranscodeError::Encode(format!(
                "engine produced no publishable files for {}",
                request.output_name
            )));
        }

        let metadata = serde_json::to_value(&output.achieved)
            .map_err(|e| TranscodeError::Internal(e.to_string()))?;
        tracker.transcoding_ended(metadata).await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::renditions::RENDITIONS;
    use crate::modules::transcoding::fakes::FakeEngine;
    use crate::modules::video::memory::MemoryRenditionRepository;
    use crate::modules::video::model::RenditionStatus;
    use crate::modules::video::state_store::RenditionStateStore;

    #[test]
    fn gate_admits_increasing_multiples_of_three() {
        let mut gate = ProgressGate::default();
        let admitted: Vec<u8> = [0, 1, 2, 3, 3, 4, 6, 5, 9, 7, 12, 100, 99]
            .into_iter()
            .filter(|p| gate.admit(*p))
            .collect();
        assert_eq!(admitted, vec![0, 3, 6, 9, 12, 99]);
    }

    #[test]
    fn request_names_outputs_after_file_and_height() {
        let source = SourceInfo {
            duration: 42.0,
            ..Default::default()
        };
        let request = EngineAdapter::request_for(&RENDITIONS[3], "abc", Path::new("/s/out"), &source);

        assert_eq!(request.output_name, "abc_720p");
        assert_eq!(request.segment_seconds, 10);
        assert!(!request.allow_cache);
        assert_eq!(request.source_duration, Some(42.0));
        assert_eq!(request.playlist_path(), Path::new("/s/out/abc_720p.m3u8"));
    }

    #[tokio::test]
    async fn persists_gated_progress_then_metadata() {
        let repo = Arc::new(MemoryRenditionRepository::default());
        let store = RenditionStateStore::new(repo.clone());
        let spec = &RENDITIONS[0];
        let mut tracker = store.open("default", "abc", spec).await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default().with_progress(vec![1, 3, 4, 6, 2, 9, 10, 33, 100]));
        let adapter = EngineAdapter::new(engine);
        let request = EngineAdapter::request_for(spec, "abc", out.path(), &SourceInfo::default());

        let output = adapter
            .encode(Path::new("/in/movie.mp4"), &request, &mut tracker)
            .await
            .unwrap();

        assert!(!output.artifacts.is_empty());
        assert_eq!(tracker.status(), RenditionStatus::TranscodingEnded);
        assert_eq!(
            tracker.job().metadata.as_ref().unwrap()["resolution"],
            serde_json::json!("426x240")
        );

        let persisted: Vec<u8> = repo
            .history(spec.id)
            .iter()
            .filter(|j| j.status == RenditionStatus::TranscodingStarted)
            .map(|j| j.progress)
            .collect();
        // first entry is the transition write itself
        assert_eq!(persisted, vec![0, 3, 6, 9, 33]);
    }

    #[tokio::test]
    async fn engine_failure_leaves_record_transcoding() {
        let repo = Arc::new(MemoryRenditionRepository::default());
        let store = RenditionStateStore::new(repo.clone());
        let spec = &RENDITIONS[1];
        let mut tracker = store.open("default", "abc", spec).await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::default().failing_at(spec.height));
        let adapter = EngineAdapter::new(engine);
        let request = EngineAdapter::request_for(spec, "abc", out.path(), &SourceInfo::default());

        let err = adapter
            .encode(Path::new("/in/movie.mp4"), &request, &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Encode(_)));
        assert_eq!(tracker.status(), RenditionStatus::TranscodingStarted);
    }
}
