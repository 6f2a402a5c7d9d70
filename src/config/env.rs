use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

/// Prefix of the versioned decryption secrets, e.g. `OPENSSL_KEY_V1`.
pub const OPENSSL_KEY_PREFIX: &str = "OPENSSL_KEY_V";

pub enum EnvKey {
    DatabaseUrl,
    RabbitMqUrl,
    TranscodeQueue,
    TranscodeResultQueue,
    QueuePrefetch,
    MinioUrl,
    MinioAccessKey,
    MinioSecretKey,
    MinioBucketFiles,
    MinioBucketVideos,
    VideoStorageRoot,
    ScratchRoot,
    StreamBaseUrl,
    FfmpegPath,
    FfprobePath,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::TranscodeQueue => "TRANSCODE_QUEUE",
            EnvKey::TranscodeResultQueue => "TRANSCODE_RESULT_QUEUE",
            EnvKey::QueuePrefetch => "TRANSCODE_PREFETCH",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::MinioBucketFiles => "MINIO_BUCKET_FILES",
            EnvKey::MinioBucketVideos => "MINIO_BUCKET_VIDEOS",
            EnvKey::VideoStorageRoot => "VIDEO_STORAGE_ROOT",
            EnvKey::ScratchRoot => "SCRATCH_ROOT",
            EnvKey::StreamBaseUrl => "STREAM_BASE_URL",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Collects every `OPENSSL_KEY_V<n>` variable into a map keyed by version.
pub fn versioned_keys() -> BTreeMap<u32, String> {
    parse_versioned_keys(env::vars())
}

fn parse_versioned_keys<I>(vars: I) -> BTreeMap<u32, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let version = name.strip_prefix(OPENSSL_KEY_PREFIX)?.parse::<u32>().ok()?;
            Some((version, value))
        })
        .collect()
}
