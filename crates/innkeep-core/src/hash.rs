//! Content hashing for media files.
//!
//! Two assets with the same `ContentHash` are byte-identical; the hash is the
//! lowercase hex SHA-256 of the file bytes.

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(digest))
    }

    /// Hash a stream without buffering it whole.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, AppError> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Parse a stored hash. Accepts upper-case hex and normalises it.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let value = value.trim();
        if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidInput(format!(
                "content hash must be 64 hex characters, got {:?}",
                value
            )));
        }
        Ok(Self(value.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
