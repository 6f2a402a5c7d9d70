use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::progress::{FfmpegProgress, parse_progress_line};
use super::{
    AchievedMetadata, Artifact, ArtifactRole, EncodeOutput, EncodeRequest, EngineError,
    ProgressEvent, SourceInfo, TranscodeEngine,
};

/// Keep only the tail of stderr in error messages.
const STDERR_TAIL: usize = 2048;

/// Builder for one ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn pair(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// HLS output for a single rendition.
    pub fn hls(input: &Path, request: &EncodeRequest) -> Self {
        Self::new(input, request.playlist_path())
            .pair("-map", "0:v:0")
            .pair("-map", "0:a:0?")
            .pair("-vf", scale_filter(request.width, request.height))
            .pair("-c:v", "libx264")
            .pair("-preset", "veryfast")
            .pair("-b:v", format!("{}k", request.video_kbps))
            .pair("-maxrate", format!("{}k", request.video_kbps))
            .pair("-bufsize", format!("{}k", request.video_kbps * 2))
            .pair("-c:a", "aac")
            .pair("-b:a", format!("{}k", request.audio_kbps))
            .pair("-ac", "2")
            .pair("-f", "hls")
            .pair("-hls_time", request.segment_seconds.to_string())
            .pair("-hls_playlist_type", "vod")
            .pair("-hls_allow_cache", if request.allow_cache { "1" } else { "0" })
            .pair(
                "-hls_segment_filename",
                request.segment_pattern().to_string_lossy().to_string(),
            )
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
        ];
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Downscale only, keep the aspect ratio, and force even dimensions.
pub fn scale_filter(width: u32, height: u32) -> String {
    format!(
        "scale=w='min({},iw)':h='min({},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2,setsar=1",
        width, height
    )
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Parse a frame rate such as `30000/1001` or `25`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

fn parse_probe(stdout: &[u8]) -> Result<SourceInfo, EngineError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| EngineError::InvalidMedia("no video stream found".to_string()))?;

    let format = probe.format.as_ref();
    let duration = video
        .duration
        .as_deref()
        .or_else(|| format.and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let bitrate = video
        .bit_rate
        .as_deref()
        .or_else(|| format.and_then(|f| f.bit_rate.as_deref()))
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);
    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .or(video.avg_frame_rate.as_deref())
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(SourceInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        frame_rate,
        bitrate_kbps: bitrate / 1000,
        codec: video.codec_name.clone().unwrap_or_default(),
    })
}

fn tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let start = trimmed.len().saturating_sub(STDERR_TAIL);
    let start = (start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(trimmed.len());
    trimmed[start..].to_string()
}

/// Engine backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn program(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    /// Files in `request.output_dir` that belong to this rendition. Segments
    /// count only when the media playlist lists them.
    async fn collect_artifacts(request: &EncodeRequest) -> Result<Vec<Artifact>, EngineError> {
        let listed = match tokio::fs::read_to_string(request.playlist_path()).await {
            Ok(body) => playlist_entries(&body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e.into()),
        };

        let mut entries = tokio::fs::read_dir(&request.output_dir).await?;
        let playlist = format!("{}.m3u8", request.output_name);
        let segment_prefix = format!("{}_", request.output_name);
        let mut artifacts = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name != playlist && !name.starts_with(&segment_prefix) {
                continue;
            }
            let artifact = Artifact::classify(entry.path());
            if artifact.role == ArtifactRole::Segment && !listed.contains(&name) {
                debug!("Skipping unlisted segment {}", name);
                continue;
            }
            artifacts.push(artifact);
        }

        // segments go up before the playlist that references them
        artifacts.sort_by(|a, b| {
            let rank = |r: ArtifactRole| (r != ArtifactRole::Segment) as u8;
            rank(a.role).cmp(&rank(b.role)).then_with(|| a.path.cmp(&b.path))
        });
        Ok(artifacts)
    }

    async fn achieved(&self, request: &EncodeRequest, artifacts: &[Artifact]) -> AchievedMetadata {
        let mut resolution = format!("{}x{}", request.width, request.height);

        if let Some(first) = artifacts.iter().find(|a| a.role == ArtifactRole::Segment) {
            match self.probe(&first.path).await {
                Ok(info) => resolution = format!("{}x{}", info.width, info.height),
                Err(e) => warn!("Could not probe {}: {}", first.path.display(), e),
            }
        }

        AchievedMetadata {
            resolution,
            video_bitrate: request.video_kbps,
            audio_bitrate: request.audio_kbps,
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn probe(&self, input: &Path) -> Result<SourceInfo, EngineError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: Self::program(&self.ffprobe),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::InvalidMedia(tail(&String::from_utf8_lossy(
                &output.stderr,
            ))));
        }

        parse_probe(&output.stdout)
    }

    async fn transcode(
        &self,
        input: &Path,
        request: &EncodeRequest,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<EncodeOutput, EngineError> {
        let args = FfmpegCommand::hls(input, request).build_args();
        debug!("Running FFmpeg: {} {}", self.ffmpeg.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: Self::program(&self.ffmpeg),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::NoOutput("ffmpeg stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::NoOutput("ffmpeg stderr".to_string()))?;

        let total_ms = request
            .source_duration
            .map(|d| (d * 1000.0) as i64)
            .unwrap_or(0);

        let report = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut state = FfmpegProgress::default();
            while let Some(line) = lines.next_line().await? {
                if let Some(snapshot) = parse_progress_line(&line, &mut state) {
                    let _ = progress
                        .send(ProgressEvent::new(snapshot.percentage(total_ms)))
                        .await;
                }
            }
            Ok::<_, std::io::Error>(())
        };
        let drain = async {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        };

        let (reported, errors) = tokio::join!(report, drain);
        let status = child.wait().await?;
        reported?;
        let errors = errors.unwrap_or_default();

        if !status.success() {
            return Err(EngineError::Failed {
                program: Self::program(&self.ffmpeg),
                message: tail(&errors),
                exit_code: status.code(),
            });
        }

        let artifacts = Self::collect_artifacts(request).await?;
        if artifacts.is_empty() {
            return Err(EngineError::NoOutput(request.output_name.clone()));
        }
        let achieved = self.achieved(request, &artifacts).await;

        Ok(EncodeOutput {
            artifacts,
            achieved,
        })
    }
}

/// URIs referenced by an HLS media playlist, reduced to file names.
fn playlist_entries(body: &str) -> HashSet<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|uri| uri.rsplit('/').next().unwrap_or(uri).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(dir: &Path) -> EncodeRequest {
        EncodeRequest {
            width: 1280,
            height: 720,
            video_kbps: 2000,
            audio_kbps: 128,
            segment_seconds: 10,
            allow_cache: false,
            output_dir: dir.to_path_buf(),
            output_name: "abc_720p".to_string(),
            source_duration: Some(60.0),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn hls_command_carries_rendition_parameters() {
        let dir = Path::new("/scratch/abc/out");
        let args = FfmpegCommand::hls(Path::new("/scratch/abc/in/movie.mp4"), &request(dir)).build_args();

        assert_eq!(value_after(&args, "-i"), Some("/scratch/abc/in/movie.mp4"));
        assert_eq!(value_after(&args, "-b:v"), Some("2000k"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-hls_time"), Some("10"));
        assert_eq!(value_after(&args, "-hls_allow_cache"), Some("0"));
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            Some("/scratch/abc/out/abc_720p_%04d.ts")
        );
        assert_eq!(args.last().map(String::as_str), Some("/scratch/abc/out/abc_720p.m3u8"));
    }

    #[test]
    fn scale_filter_never_upscales() {
        let filter = scale_filter(640, 360);
        assert!(filter.contains("min(640,iw)"));
        assert!(filter.contains("min(360,ih)"));
        assert!(filter.contains("force_divisible_by=2"));
    }

    #[test]
    fn parses_ffprobe_json() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "r_frame_rate": "30000/1001", "duration": "12.5", "bit_rate": "4500000"}
            ],
            "format": {"duration": "12.6", "bit_rate": "4700000"}
        }"#;

        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.codec, "h264");
        assert_eq!(info.bitrate_kbps, 4500);
        assert!((info.duration - 12.5).abs() < 1e-9);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn audio_only_input_is_invalid() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(parse_probe(json), Err(EngineError::InvalidMedia(_))));
    }

    #[test]
    fn frame_rate_forms() {
        assert!((parse_frame_rate("25/1").unwrap() - 25.0).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    const MEDIA_PLAYLIST: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\nabc_720p_0000.ts\n#EXTINF:4.2,\nabc_720p_0001.ts\n#EXT-X-ENDLIST\n";

    #[tokio::test]
    async fn collects_only_this_renditions_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc_720p.m3u8"), MEDIA_PLAYLIST).unwrap();
        for name in ["abc_720p_0000.ts", "abc_720p_0001.ts", "abc_360p.m3u8", "abc.m3u8"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let artifacts = FfmpegEngine::collect_artifacts(&request(dir.path())).await.unwrap();
        let names: Vec<_> = artifacts.iter().filter_map(|a| a.file_name()).collect();

        assert_eq!(names, vec!["abc_720p_0000.ts", "abc_720p_0001.ts", "abc_720p.m3u8"]);
    }

    #[tokio::test]
    async fn segments_missing_from_the_playlist_are_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc_720p.m3u8"), MEDIA_PLAYLIST).unwrap();
        for name in ["abc_720p_0000.ts", "abc_720p_0001.ts", "abc_720p_0042.ts"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let artifacts = FfmpegEngine::collect_artifacts(&request(dir.path())).await.unwrap();
        let names: Vec<_> = artifacts.iter().filter_map(|a| a.file_name()).collect();

        assert!(!names.contains(&"abc_720p_0042.ts"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn playlist_entries_skip_tags_and_paths() {
        let entries = playlist_entries("#EXTM3U\n\n#EXTINF:10.0,\nsub/abc_720p_0000.ts\r\nabc_720p_0001.ts\n");
        assert_eq!(entries.len(), 2);
        assert!(entries.contains("abc_720p_0000.ts"));
        assert!(entries.contains("abc_720p_0001.ts"));
    }
}
