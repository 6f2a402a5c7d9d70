//! The external media engine: probing and HLS encoding of one rendition.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod ffmpeg;
pub mod progress;

pub const HLS_PLAYLIST_MIME: &str = "application/vnd.apple.mpegurl";
pub const MPEG_TS_MIME: &str = "video/mp2t";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {exit_code:?}: {message}")]
    Failed {
        program: String,
        message: String,
        exit_code: Option<i32>,
    },

    #[error("not a decodable media file: {0}")]
    InvalidMedia(String),

    #[error("engine produced no output for {0}")]
    NoOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stream facts extracted while probing a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub bitrate_kbps: u64,
    pub codec: String,
}

/// Parameters for one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
    pub segment_seconds: u32,
    pub allow_cache: bool,
    pub output_dir: PathBuf,
    /// Stem shared by the media playlist and its segments, e.g. `abc_720p`.
    pub output_name: String,
    pub source_duration: Option<f64>,
}

impl EncodeRequest {
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.m3u8", self.output_name))
    }

    pub fn segment_pattern(&self) -> PathBuf {
        self.output_dir.join(format!("{}_%04d.ts", self.output_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactRole {
    MasterPlaylist,
    MediaPlaylist,
    Segment,
    /// Engine bookkeeping that is never published.
    Sidecar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub mime: String,
    pub role: ArtifactRole,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, role: ArtifactRole) -> Self {
        let path = path.into();
        let mime = match role {
            ArtifactRole::MasterPlaylist | ArtifactRole::MediaPlaylist => HLS_PLAYLIST_MIME.to_string(),
            ArtifactRole::Segment => MPEG_TS_MIME.to_string(),
            ArtifactRole::Sidecar => mime_guess::from_path(&path).first_or_octet_stream().to_string(),
        };
        Self { path, mime, role }
    }

    /// Classifies an engine output file by its extension.
    pub fn classify(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let role = match path.extension().and_then(|e| e.to_str()) {
            Some("m3u8") => ArtifactRole::MediaPlaylist,
            Some("ts") | Some("m4s") | Some("aac") => ArtifactRole::Segment,
            _ => ArtifactRole::Sidecar,
        };
        Self::new(path, role)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// What the engine reports it actually produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievedMetadata {
    pub resolution: String,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
}

#[derive(Debug, Clone)]
pub struct EncodeOutput {
    pub artifacts: Vec<Artifact>,
    pub achieved: AchievedMetadata,
}

/// Engine progress, 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(percent: f64) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0).floor() as u8,
        }
    }
}

#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<SourceInfo, EngineError>;

    /// Encodes one rendition, sending progress on `progress` as it goes.
    /// Send failures are ignored; the caller may stop listening.
    async fn transcode(
        &self,
        input: &Path,
        request: &EncodeRequest,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<EncodeOutput, EngineError>;
}
