use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::CodecError;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

/// Encryption parameters recorded on a file at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encryption {
    pub cipher: String,
    pub version: String,
    pub iv: String,
    pub tag: String,
}

/// Versioned secrets used to decrypt stored files.
#[derive(Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<u32, Vec<u8>>,
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("versions", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl KeyRing {
    pub fn new(keys: &BTreeMap<u32, String>) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(version, secret)| (*version, secret.as_bytes().to_vec()))
                .collect(),
        }
    }

    /// Decrypts an OpenSSL-style payload (base64 ciphertext, hex IV and tag).
    pub fn decrypt(&self, data: &[u8], params: &Encryption) -> Result<Vec<u8>, CodecError> {
        let secret = params
            .version
            .parse::<u32>()
            .ok()
            .and_then(|v| self.keys.get(&v))
            .ok_or_else(|| CodecError::MissingKey(params.version.clone()))?;

        let iv = hex::decode(params.iv.trim()).map_err(|e| CodecError::MalformedParameter {
            name: "iv",
            reason: e.to_string(),
        })?;
        if iv.len() != GCM_NONCE_LEN {
            return Err(CodecError::MalformedParameter {
                name: "iv",
                reason: format!("expected {} bytes, got {}", GCM_NONCE_LEN, iv.len()),
            });
        }

        let tag = hex::decode(params.tag.trim()).map_err(|e| CodecError::MalformedParameter {
            name: "tag",
            reason: e.to_string(),
        })?;
        if tag.len() != GCM_TAG_LEN {
            return Err(CodecError::MalformedParameter {
                name: "tag",
                reason: format!("expected {} bytes, got {}", GCM_TAG_LEN, tag.len()),
            });
        }

        let mut sealed = STANDARD
            .decode(trim_ascii(data))
            .map_err(|e| CodecError::MalformedParameter {
                name: "ciphertext",
                reason: e.to_string(),
            })?;
        sealed.extend_from_slice(&tag);

        let nonce = Nonce::from_slice(&iv);
        let plain = match params.cipher.to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Aes128Gcm::new_from_slice(&fit_key(secret, 16))
                .map_err(|_| CodecError::AuthenticationFailed)?
                .decrypt(nonce, sealed.as_slice()),
            "aes-256-gcm" => Aes256Gcm::new_from_slice(&fit_key(secret, 32))
                .map_err(|_| CodecError::AuthenticationFailed)?
                .decrypt(nonce, sealed.as_slice()),
            other => return Err(CodecError::UnsupportedCipher(other.to_string())),
        };

        plain.map_err(|_| CodecError::AuthenticationFailed)
    }
}

/// OpenSSL truncates long secrets and zero-pads short ones to the key length.
fn fit_key(secret: &[u8], len: usize) -> Vec<u8> {
    let mut key = secret.iter().copied().take(len).collect::<Vec<_>>();
    key.resize(len, 0);
    key
}

fn trim_ascii(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &data[start..end]
}

/// Test helper producing the stored representation of `plain`.
#[cfg(test)]
pub fn seal_for_tests(plain: &[u8], secret: &str, iv: [u8; 12]) -> (Vec<u8>, String, String) {
    let cipher = Aes128Gcm::new_from_slice(&fit_key(secret.as_bytes(), 16)).unwrap();
    let mut sealed = cipher.encrypt(Nonce::from_slice(&iv), plain).unwrap();
    let tag = sealed.split_off(sealed.len() - GCM_TAG_LEN);
    (
        STANDARD.encode(sealed).into_bytes(),
        hex::encode(iv),
        hex::encode(tag),
    )
}
