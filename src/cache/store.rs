//! Persistence backends for cached distance matrices

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::algorithm::distance::HybridMetric;
use crate::cache::{CachedMatrix, DistanceMatrix};
use crate::error::{Error, Result};
use crate::models::CaseKey;
use crate::utils::io::atomic::write_json_atomic;
use crate::utils::logging::log_warning;

/// Version of the on-disk matrix artifact
pub const MATRIX_FORMAT_VERSION: u32 = 1;

/// Storage for per-diagnosis matrices
pub trait MatrixStore: Send + Sync {
    /// Load the entry for `diagnosis`.
    ///
    /// Unreadable or corrupt entries are reported as `None` so the caller
    /// rebuilds; they are never fatal.
    fn load(&self, diagnosis: &str) -> Result<Option<CachedMatrix>>;

    /// Publish a complete entry, replacing any previous one
    fn save(&self, entry: &CachedMatrix) -> Result<()>;

    /// Drop the entry for `diagnosis`
    fn invalidate(&self, diagnosis: &str) -> Result<()>;

    /// Drop every entry
    fn clear(&self) -> Result<()>;
}

/// Process-local store, used for windowed runs and when no cache directory is set
#[derive(Debug, Default)]
pub struct MemoryMatrixStore {
    entries: Mutex<FxHashMap<String, CachedMatrix>>,
}

impl MemoryMatrixStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, CachedMatrix>>> {
        self.entries.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Number of cached diagnoses
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }
}

impl MatrixStore for MemoryMatrixStore {
    fn load(&self, diagnosis: &str) -> Result<Option<CachedMatrix>> {
        Ok(self.entries()?.get(diagnosis).cloned())
    }

    fn save(&self, entry: &CachedMatrix) -> Result<()> {
        self.entries()?
            .insert(entry.diagnosis.clone(), entry.clone());
        Ok(())
    }

    fn invalidate(&self, diagnosis: &str) -> Result<()> {
        self.entries()?.remove(diagnosis);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries()?.clear();
        Ok(())
    }
}

/// Serialized form of a [`CachedMatrix`]
#[derive(Debug, Serialize, Deserialize)]
struct MatrixArtifact {
    format_version: u32,
    diagnosis: String,
    metric: HybridMetric,
    keys: Vec<CaseKey>,
    size: usize,
    values: Vec<f64>,
}

/// One JSON file per diagnosis inside a cache directory
#[derive(Debug, Clone)]
pub struct FileMatrixStore {
    dir: PathBuf,
}

impl FileMatrixStore {
    /// Use `dir` as the cache directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        crate::error::util::ensure_directory(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the matrix for `diagnosis`
    #[must_use]
    pub fn path_for(&self, diagnosis: &str) -> PathBuf {
        self.dir.join(format!("matrix_{}.json", file_stem(diagnosis)))
    }

    fn read_artifact(path: &Path) -> Result<MatrixArtifact> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn into_entry(diagnosis: &str, artifact: MatrixArtifact) -> Result<CachedMatrix> {
        let integrity = |reason: String| Error::CacheIntegrity {
            diagnosis: diagnosis.to_string(),
            reason,
        };
        if artifact.format_version != MATRIX_FORMAT_VERSION {
            return Err(integrity(format!(
                "unsupported format version {}",
                artifact.format_version
            )));
        }
        if artifact.diagnosis != diagnosis {
            return Err(integrity(format!(
                "artifact belongs to diagnosis '{}'",
                artifact.diagnosis
            )));
        }
        if artifact.size != artifact.keys.len() {
            return Err(integrity(format!(
                "{} keys recorded for a matrix of size {}",
                artifact.keys.len(),
                artifact.size
            )));
        }
        let matrix = DistanceMatrix::from_parts(artifact.size, artifact.values)
            .map_err(|e| integrity(e.to_string()))?;
        Ok(CachedMatrix {
            diagnosis: artifact.diagnosis,
            metric: artifact.metric,
            keys: artifact.keys,
            matrix,
        })
    }
}

impl MatrixStore for FileMatrixStore {
    fn load(&self, diagnosis: &str) -> Result<Option<CachedMatrix>> {
        let path = self.path_for(diagnosis);
        if !path.exists() {
            return Ok(None);
        }

        match Self::read_artifact(&path).and_then(|a| Self::into_entry(diagnosis, a)) {
            Ok(entry) => {
                debug!("Loaded cached matrix of {} cases from {}", entry.len(), path.display());
                Ok(Some(entry))
            }
            Err(e) => {
                log_warning(
                    &format!("Ignoring unreadable matrix cache (will rebuild): {e}"),
                    Some(&path),
                );
                Ok(None)
            }
        }
    }

    fn save(&self, entry: &CachedMatrix) -> Result<()> {
        let artifact = MatrixArtifact {
            format_version: MATRIX_FORMAT_VERSION,
            diagnosis: entry.diagnosis.clone(),
            metric: entry.metric,
            keys: entry.keys.clone(),
            size: entry.matrix.len(),
            values: entry.matrix.values().to_vec(),
        };
        let path = self.path_for(&entry.diagnosis);
        write_json_atomic(&path, &artifact)?;
        debug!("Saved matrix of {} cases to {}", entry.len(), path.display());
        Ok(())
    }

    fn invalidate(&self, diagnosis: &str) -> Result<()> {
        let path = self.path_for(diagnosis);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.dir, e))?.path();
            let is_matrix = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("matrix_") && name.ends_with(".json"));
            if is_matrix {
                std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            }
        }
        Ok(())
    }
}

/// Filesystem-safe stem for a diagnosis name.
///
/// Only names made of ASCII alphanumerics and `-` are used as-is. Anything
/// else, `_` included, gets its UTF-8 bytes appended in hex, so two distinct
/// diagnoses never share a file.
fn file_stem(diagnosis: &str) -> String {
    let is_plain = |c: char| c.is_ascii_alphanumeric() || c == '-';
    if !diagnosis.is_empty() && diagnosis.chars().all(is_plain) {
        return diagnosis.to_string();
    }
    let safe: String = diagnosis
        .chars()
        .map(|c| if is_plain(c) { c } else { '_' })
        .collect();
    let hex: String = diagnosis.bytes().map(|b| format!("{b:02x}")).collect();
    format!("{safe}_{hex}")
}
