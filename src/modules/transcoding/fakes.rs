//! Scriptable engine for pipeline tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::infrastructure::media::{
    AchievedMetadata, Artifact, EncodeOutput, EncodeRequest, EngineError, ProgressEvent,
    SourceInfo, TranscodeEngine,
};

pub struct FakeEngine {
    progress: Vec<u8>,
    failing_heights: HashSet<u32>,
    invalid_media: bool,
    /// Inputs seen by `transcode`, in call order.
    pub calls: Mutex<Vec<(PathBuf, EncodeRequest)>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            progress: vec![0, 25, 50, 75, 100],
            failing_heights: HashSet::new(),
            invalid_media: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEngine {
    pub fn with_progress(mut self, progress: Vec<u8>) -> Self {
        self.progress = progress;
        self
    }

    pub fn failing_at(mut self, height: u32) -> Self {
        self.failing_heights.insert(height);
        self
    }

    pub fn rejecting_input(mut self) -> Self {
        self.invalid_media = true;
        self
    }

    /// Bytes the fake writes for segment `n` of a rendition.
    pub fn segment_bytes(output_name: &str, n: usize) -> Vec<u8> {
        format!("segment {} of {}", n, output_name).into_bytes()
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn probe(&self, input: &Path) -> Result<SourceInfo, EngineError> {
        if self.invalid_media {
            return Err(EngineError::InvalidMedia(format!("{} has no streams", input.display())));
        }
        Ok(SourceInfo {
            duration: 30.0,
            width: 1920,
            height: 1080,
            frame_rate: 25.0,
            bitrate_kbps: 5000,
            codec: "h264".to_string(),
        })
    }

    async fn transcode(
        &self,
        input: &Path,
        request: &EncodeRequest,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<EncodeOutput, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), request.clone()));

        for percent in &self.progress {
            let _ = progress.send(ProgressEvent { percent: *percent }).await;
        }

        if self.failing_heights.contains(&request.height) {
            return Err(EngineError::Failed {
                program: "fake".to_string(),
                message: format!("cannot encode {}p", request.height),
                exit_code: Some(1),
            });
        }

        let mut artifacts = Vec::new();
        for n in 0..2 {
            let path = request.output_dir.join(format!("{}_{:04}.ts", request.output_name, n));
            tokio::fs::write(&path, Self::segment_bytes(&request.output_name, n)).await?;
            artifacts.push(Artifact::classify(path));
        }
        let playlist = request.playlist_path();
        tokio::fs::write(&playlist, format!("#EXTM3U\n# {}\n", request.output_name)).await?;
        artifacts.push(Artifact::classify(playlist));

        Ok(EncodeOutput {
            artifacts,
            achieved: AchievedMetadata {
                resolution: format!("{}x{}", request.width, request.height),
                video_bitrate: request.video_kbps,
                audio_bitrate: request.audio_kbps,
            },
        })
    }
}
