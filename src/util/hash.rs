//! Content hashing for generated files and plan fingerprints.

use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// SHA-256 of a byte slice, hex encoded.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a string, hex encoded.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// SHA-256 of a file's contents, or `None` if the file does not exist.
pub fn sha256_file_if_exists(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
    Ok(Some(sha256_bytes(&data)))
}

/// Incremental fingerprint over an ordered sequence of components.
///
/// Components are NUL-separated so `["ab", "c"]` and `["a", "bc"]` differ.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add every string in order.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize into a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize into the first 16 hex characters.
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}
