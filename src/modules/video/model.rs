use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::infrastructure::crypto::cipher::Encryption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenditionStatus {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "transcoding started")]
    TranscodingStarted,
    #[serde(rename = "transcoding ended")]
    TranscodingEnded,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "error")]
    Error,
}

impl RenditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenditionStatus::Created => "created",
            RenditionStatus::TranscodingStarted => "transcoding started",
            RenditionStatus::TranscodingEnded => "transcoding ended",
            RenditionStatus::Uploading => "uploading",
            RenditionStatus::Ready => "ready",
            RenditionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RenditionStatus::Ready | RenditionStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            RenditionStatus::Created => 0,
            RenditionStatus::TranscodingStarted => 1,
            RenditionStatus::TranscodingEnded => 2,
            RenditionStatus::Uploading => 3,
            RenditionStatus::Ready => 4,
            RenditionStatus::Error => u8::MAX,
        }
    }

    /// Forward along the success path, or to Error from any live state.
    pub fn can_transition_to(&self, next: RenditionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RenditionStatus::Error => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for RenditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenditionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(RenditionStatus::Created),
            "transcoding started" => Ok(RenditionStatus::TranscodingStarted),
            "transcoding ended" => Ok(RenditionStatus::TranscodingEnded),
            "uploading" => Ok(RenditionStatus::Uploading),
            "ready" => Ok(RenditionStatus::Ready),
            "error" => Ok(RenditionStatus::Error),
            other => Err(format!("unknown rendition status '{}'", other)),
        }
    }
}

/// Durable per-rendition record, unique on (bucket_id, file_id, rendition_id).
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionJob {
    pub id: Uuid,
    pub bucket_id: String,
    pub file_id: String,
    pub rendition_id: String,
    pub rendition_name: String,
    pub status: RenditionStatus,
    pub progress: u8,
    pub metadata: Option<serde_json::Value>,
    pub time_started: Option<OffsetDateTime>,
    pub time_ended: Option<OffsetDateTime>,
}

impl RenditionJob {
    pub fn new(bucket_id: &str, file_id: &str, rendition_id: &str, rendition_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            bucket_id: bucket_id.to_string(),
            file_id: file_id.to_string(),
            rendition_id: rendition_id.to_string(),
            rendition_name: rendition_name.to_string(),
            status: RenditionStatus::Created,
            progress: 0,
            metadata: None,
            time_started: None,
            time_ended: None,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RenditionRow {
    pub id: Uuid,
    pub bucket_id: String,
    pub file_id: String,
    pub rendition_id: String,
    pub rendition_name: String,
    pub status: String,
    pub progress: i16,
    pub metadata: Option<serde_json::Value>,
    pub time_started: Option<OffsetDateTime>,
    pub time_ended: Option<OffsetDateTime>,
}

impl TryFrom<RenditionRow> for RenditionJob {
    type Error = String;

    fn try_from(row: RenditionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            bucket_id: row.bucket_id,
            file_id: row.file_id,
            rendition_id: row.rendition_id,
            rendition_name: row.rendition_name,
            status: row.status.parse()?,
            progress: row.progress.clamp(0, 100) as u8,
            metadata: row.metadata,
            time_started: row.time_started,
            time_ended: row.time_ended,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// An uploaded asset as recorded by the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: String,
    pub bucket_id: String,
    pub path: String,
    pub mime_type: String,
    pub encryption: Option<Encryption>,
    pub compression: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct FileRow {
    pub id: String,
    pub bucket_id: String,
    pub path: String,
    pub mime_type: String,
    pub openssl_cipher: Option<String>,
    pub openssl_version: Option<String>,
    pub openssl_iv: Option<String>,
    pub openssl_tag: Option<String>,
    pub algorithm: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<FileRow> for SourceFile {
    fn from(row: FileRow) -> Self {
        let encryption = non_empty(row.openssl_cipher).map(|cipher| Encryption {
            cipher,
            version: row.openssl_version.unwrap_or_default(),
            iv: row.openssl_iv.unwrap_or_default(),
            tag: row.openssl_tag.unwrap_or_default(),
        });

        Self {
            id: row.id,
            bucket_id: row.bucket_id,
            path: row.path,
            mime_type: row.mime_type,
            encryption,
            compression: non_empty(row.algorithm),
        }
    }
}
