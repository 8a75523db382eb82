//! Per-document annotation cache.
//!
//! A derived snapshot of each document's annotation records, keyed by a
//! hash of the document's absolute path. The document file itself is the
//! source of truth; this cache only speeds up startup and feeds the
//! annotation list before the document finishes loading, so stale or
//! missing entries are never an error.

use directories::ProjectDirs;
use doc_model::AnnotationRecord;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::warn;

const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct AnnotationCache {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    annotations: Vec<AnnotationRecord>,
}

impl AnnotationCache {
    pub fn from_default_project() -> Result<Self, CacheError> {
        let dirs = ProjectDirs::from("dev", "PaperReader", "PaperReader")
            .ok_or(CacheError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().join("annotations") })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the cached records for a document.
    ///
    /// Absent, unreadable, or schema-incompatible entries all yield an
    /// empty list; the cache is advisory and the caller reconciles against
    /// the document anyway.
    pub fn load(&self, document_path: &Path) -> Vec<AnnotationRecord> {
        let path = self.slot_path(document_path);
        if !path.exists() {
            return Vec::new();
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read annotation cache");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<CacheEnvelope>(&bytes) {
            Ok(envelope) if envelope.version == CACHE_SCHEMA_VERSION => envelope.annotations,
            Ok(envelope) => {
                warn!(
                    path = %path.display(),
                    version = envelope.version,
                    "ignoring annotation cache with unknown schema version"
                );
                Vec::new()
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable annotation cache");
                Vec::new()
            }
        }
    }

    /// Persist the records for a document atomically.
    pub fn save(
        &self,
        document_path: &Path,
        annotations: &[AnnotationRecord],
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            CacheEnvelope { version: CACHE_SCHEMA_VERSION, annotations: annotations.to_vec() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        // Write to a sibling temp file first so a crash never leaves a
        // truncated cache behind.
        let path = self.slot_path(document_path);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    /// Drop the cache entry for a document, if any.
    pub fn delete(&self, document_path: &Path) -> Result<(), CacheError> {
        let path = self.slot_path(document_path);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn slot_path(&self, document_path: &Path) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        document_path.hash(&mut hasher);
        self.root.join(format!("annotations-{:016x}.json", hasher.finish()))
    }
}
