//! Content-addressed spectrogram store.
//!
//! Records live under `<project>/spectrograms/` as `<md5>.json`, keyed by the
//! MD5 hex digest of the segment WAV's bytes. Presence of a key is
//! authoritative: the pipeline never regenerates or overwrites an existing
//! record. Writes go through a temp sibling plus rename so a half-written
//! file is never observable as a valid record.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spectrogram tensors are square with this many rows and columns.
pub const SPECTROGRAM_SIZE: usize = 1024;

/// Errors that can occur in the content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One persisted spectrogram, serialized in declaration order.
///
/// `chunk_path` records where the segment WAV lived when the record was
/// generated. Segment files are deleted right after persistence, so the path
/// is advisory and usually dangling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramRecord {
    pub file_name: String,
    pub md5_hash: String,
    pub chunk_path: String,
    pub spectrogram: Vec<Vec<f64>>,
}

/// Filesystem-backed store rooted at a project's `spectrograms/` directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for a content hash.
    pub fn record_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash))
    }

    /// MD5 hex digest over the full byte content of a file.
    pub async fn hash_file(path: &Path) -> Result<String, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(hash_bytes(&bytes))
    }

    /// Idempotency gate: does a record for this hash already exist?
    pub fn contains(&self, hash: &str) -> bool {
        self.record_path(hash).exists()
    }

    /// Atomically persist a record: write to a temp sibling, then rename.
    ///
    /// Concurrent writers of the same hash produce identical bytes, so the
    /// occasional double-write resolves to the same file either way.
    pub async fn write(&self, hash: &str, record: &SpectrogramRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)?;
        let tmp_path = self.dir.join(format!("{}.json.tmp", hash));
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, self.record_path(hash)).await?;
        Ok(())
    }

    /// Load a record from an arbitrary path (used by the clustering stage).
    pub async fn load(path: &Path) -> Result<SpectrogramRecord, StoreError> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// MD5 hex digest of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
