use thiserror::Error;

use crate::infrastructure::crypto::CodecError;
use crate::modules::video::repository::StoreError;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("invalid job request: {0}")]
    InvalidRequest(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("source storage unavailable: {0}")]
    Storage(String),

    #[error("source integrity check failed: {0}")]
    Integrity(#[from] CodecError),

    #[error("invalid media: {0}")]
    InvalidMedia(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("rendition store error: {0}")]
    Store(#[from] StoreError),

    #[error("scratch filesystem error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TranscodeError {
    pub fn code(&self) -> &'static str {
        match self {
            TranscodeError::InvalidRequest(_) => "invalid_request",
            TranscodeError::SourceNotFound(_) => "source_not_found",
            TranscodeError::Storage(_) => "storage_error",
            TranscodeError::Integrity(_) => "integrity_error",
            TranscodeError::InvalidMedia(_) => "invalid_media",
            TranscodeError::Encode(_) => "encode_error",
            TranscodeError::Upload(_) => "upload_error",
            TranscodeError::Store(_) => "store_error",
            TranscodeError::Scratch(_) => "scratch_error",
            TranscodeError::Internal(_) => "internal_error",
        }
    }

    pub fn to_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}
