//! Source identifier commitments
//!
//! Rules never store the resource locator itself, only a SHA-256 commitment
//! to it. Attestations are bound to a rule by re-hashing the claimed locator.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 commitment to a source identifier, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceHash(String);

impl SourceHash {
    /// Wrap an already-computed hex digest (e.g. loaded from storage).
    pub fn from_hex(hex_digest: impl Into<String>) -> Option<Self> {
        let hex_digest = hex_digest.into().to_lowercase();
        match hex::decode(&hex_digest) {
            Ok(bytes) if bytes.len() == 32 => Some(Self(hex_digest)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a source identifier exactly as given. No URL normalization is applied:
/// `https://a/b` and `https://a/b/` are different sources.
pub fn hash_source_identifier(source_identifier: &str) -> SourceHash {
    let mut hasher = Sha256::new();
    hasher.update(source_identifier.as_bytes());
    SourceHash(hex::encode(hasher.finalize()))
}
