use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::error::TranscodeError;
use crate::infrastructure::media::{EngineError, SourceInfo, TranscodeEngine};

/// Refuses sources the engine cannot decode before any encoding starts.
#[derive(Clone)]
pub struct MediaProber {
    engine: Arc<dyn TranscodeEngine>,
}

impl MediaProber {
    pub fn new(engine: Arc<dyn TranscodeEngine>) -> Self {
        Self { engine }
    }

    pub async fn probe(&self, input: &Path) -> Result<SourceInfo, TranscodeError> {
        let info = self.engine.probe(input).await.map_err(|e| match e {
            EngineError::Spawn { .. } => TranscodeError::Internal(e.to_string()),
            other => TranscodeError::InvalidMedia(format!("{}: {}", input.display(), other)),
        })?;

        info!(
            duration = info.duration,
            width = info.width,
            height = info.height,
            frame_rate = info.frame_rate,
            bitrate_kbps = info.bitrate_kbps,
            codec = %info.codec,
            "🔎 Probed source"
        );
        Ok(info)
    }
}
