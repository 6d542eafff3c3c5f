//! Incremental distance matrix cache
//!
//! Each diagnosis keeps the ordered list of cases its matrix was built over.
//! A new run reuses the matrix only if that list is an exact ordered prefix of
//! the group's current cases and the metric weights are unchanged; anything
//! else (deleted, reordered or edited case) discards the cache and rebuilds.

pub mod matrix;
pub mod store;

pub use matrix::DistanceMatrix;
pub use store::{FileMatrixStore, MatrixStore, MemoryMatrixStore};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::distance::HybridMetric;
use crate::error::{Error, Result};
use crate::models::{Case, CaseKey};

/// A distance matrix together with the identity of the cases it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMatrix {
    /// Diagnosis this matrix belongs to
    pub diagnosis: String,
    /// Weights the distances were computed with
    pub metric: HybridMetric,
    /// Case identities, index-aligned with the matrix
    pub keys: Vec<CaseKey>,
    /// Pairwise distances
    pub matrix: DistanceMatrix,
}

impl CachedMatrix {
    /// Build a fresh cache entry for a group from scratch
    pub fn build(diagnosis: &str, cases: &[Case], metric: &HybridMetric) -> Result<Self> {
        Ok(Self {
            diagnosis: diagnosis.to_string(),
            metric: *metric,
            keys: cases.iter().map(Case::key).collect(),
            matrix: DistanceMatrix::build(cases, metric)?,
        })
    }

    /// Number of cases covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check this entry can be extended to cover `cases`.
    ///
    /// Returns [`Error::CacheIntegrity`] describing the first mismatch.
    pub fn validate_prefix(&self, cases: &[Case], metric: &HybridMetric) -> Result<()> {
        let integrity = |reason: String| Error::CacheIntegrity {
            diagnosis: self.diagnosis.clone(),
            reason,
        };

        if self.metric != *metric {
            return Err(integrity(format!(
                "metric weights changed from {:?} to {:?}",
                self.metric, metric
            )));
        }
        if self.matrix.len() != self.keys.len() {
            return Err(integrity(format!(
                "matrix covers {} cases but {} keys are recorded",
                self.matrix.len(),
                self.keys.len()
            )));
        }
        if self.keys.len() > cases.len() {
            return Err(integrity(format!(
                "cache covers {} cases but the group now has {}",
                self.keys.len(),
                cases.len()
            )));
        }
        if let Some(position) = self
            .keys
            .iter()
            .zip(cases)
            .position(|(key, case)| *key != case.key())
        {
            return Err(integrity(format!(
                "case at position {position} no longer matches the cached case"
            )));
        }
        Ok(())
    }

    /// Extend this entry with the cases appended since it was built
    pub fn extend(&self, cases: &[Case], metric: &HybridMetric) -> Result<Self> {
        self.validate_prefix(cases, metric)?;
        let matrix = self.matrix.extend(cases, metric)?;
        let mut keys = self.keys.clone();
        keys.extend(cases[self.keys.len()..].iter().map(Case::key));
        Ok(Self {
            diagnosis: self.diagnosis.clone(),
            metric: *metric,
            keys,
            matrix,
        })
    }
}

/// How a group's matrix was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// No usable cache; computed from scratch
    Built,
    /// Cached block reused, `added` cases computed incrementally
    Extended { reused: usize, added: usize },
    /// Cache failed the integrity check and was rebuilt
    Rebuilt { reason: String },
}

impl CacheOutcome {
    /// Whether the stored entry must be rewritten
    #[must_use]
    pub fn needs_save(&self) -> bool {
        !matches!(self, Self::Extended { added: 0, .. })
    }
}

/// Obtain the matrix for a group, reusing `cached` when it is still valid.
///
/// Integrity failures are recovered here: logged and rebuilt from scratch.
/// Only metric errors on the current cases propagate.
pub fn extend_or_rebuild(
    diagnosis: &str,
    cached: Option<CachedMatrix>,
    cases: &[Case],
    metric: &HybridMetric,
) -> Result<(CachedMatrix, CacheOutcome)> {
    let Some(cached) = cached else {
        debug!("No cached matrix for '{diagnosis}', building {} cases", cases.len());
        return Ok((CachedMatrix::build(diagnosis, cases, metric)?, CacheOutcome::Built));
    };

    match cached.validate_prefix(cases, metric) {
        Ok(()) => {
            let reused = cached.len();
            let added = cases.len() - reused;
            debug!("Extending cached matrix for '{diagnosis}': {reused} reused, {added} new");
            let entry = cached.extend(cases, metric)?;
            Ok((entry, CacheOutcome::Extended { reused, added }))
        }
        Err(Error::CacheIntegrity { reason, .. }) => {
            warn!("Discarding cached matrix for '{diagnosis}' and rebuilding: {reason}");
            let entry = CachedMatrix::build(diagnosis, cases, metric)?;
            Ok((entry, CacheOutcome::Rebuilt { reason }))
        }
        Err(e) => Err(e),
    }
}
