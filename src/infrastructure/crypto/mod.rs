//! Reverses the at-rest protection applied to uploaded files: authenticated
//! decryption followed by decompression.

use thiserror::Error;

pub mod cipher;
pub mod compression;

pub use cipher::KeyRing;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no secret configured for key version {0}")]
    MissingKey(String),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("malformed encryption parameter {name}: {reason}")]
    MalformedParameter { name: &'static str, reason: String },

    #[error("authentication failed: ciphertext or tag does not match")]
    AuthenticationFailed,

    #[error("unsupported compression algorithm: {0}")]
    UnsupportedCompression(String),

    #[error("decompression failed: {0}")]
    Decompression(#[from] std::io::Error),
}
