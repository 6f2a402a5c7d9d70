use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub rabbitmq_url: String,
    pub transcode_queue: String,
    pub transcode_result_queue: String,
    pub queue_prefetch: u16,
    pub minio_url: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub minio_bucket_files: String,
    pub minio_bucket_videos: String,
    pub video_storage_root: String,
    pub scratch_root: PathBuf,
    pub stream_base_url: String,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub openssl_keys: BTreeMap<u32, String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            database_url: env::get(EnvKey::DatabaseUrl)?,
            rabbitmq_url: env::get(EnvKey::RabbitMqUrl)?,
            transcode_queue: env::get_or(EnvKey::TranscodeQueue, "transcoding_tasks"),
            transcode_result_queue: env::get_or(EnvKey::TranscodeResultQueue, "transcoding_results"),
            queue_prefetch: env::get_parsed(EnvKey::QueuePrefetch, 1),
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            minio_bucket_files: env::get(EnvKey::MinioBucketFiles)?,
            minio_bucket_videos: env::get(EnvKey::MinioBucketVideos)?,
            video_storage_root: env::get_or(EnvKey::VideoStorageRoot, "videos"),
            scratch_root: PathBuf::from(env::get_or(EnvKey::ScratchRoot, "/tmp")),
            stream_base_url: env::get_or(EnvKey::StreamBaseUrl, "http://localhost"),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            ffprobe_path: PathBuf::from(env::get_or(EnvKey::FfprobePath, "ffprobe")),
            openssl_keys: env::versioned_keys(),
        })
    }
}
