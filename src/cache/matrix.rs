//! Symmetric pairwise distance matrix with incremental growth

use serde::{Deserialize, Serialize};

use crate::algorithm::distance::HybridMetric;
use crate::error::{Error, Result};
use crate::models::Case;

/// Row-major `n x n` matrix of hybrid distances over an ordered case list.
///
/// Index `i` always refers to the same case; growth appends rows and columns
/// at the end and never reorders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Rebuild a matrix from its persisted parts
    pub fn from_parts(size: usize, values: Vec<f64>) -> Result<Self> {
        let expected = size
            .checked_mul(size)
            .ok_or_else(|| Error::invalid_input(format!("matrix size {size} overflows")))?;
        if values.len() != expected {
            return Err(Error::invalid_input(format!(
                "matrix of size {size} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { size, values })
    }

    /// Compute the full matrix for `cases` from scratch
    pub fn build(cases: &[Case], metric: &HybridMetric) -> Result<Self> {
        Self::default().extend(cases, metric)
    }

    /// Number of cases covered
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance between case `i` and case `j`
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    /// All distances from case `i`
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Raw row-major values
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Grow the matrix to cover `cases`.
    ///
    /// The first `self.len()` entries of `cases` must be the cases this matrix
    /// was built over, in the same order; the caller checks that. The old block
    /// is copied verbatim and only cells touching a new row are computed, so
    /// the cost is `O(n_new * n_total)`.
    pub fn extend(&self, cases: &[Case], metric: &HybridMetric) -> Result<Self> {
        let old = self.size;
        let total = cases.len();
        if total < old {
            return Err(Error::invalid_input(format!(
                "cannot extend a matrix of {old} cases to {total} cases"
            )));
        }
        if total == old {
            return Ok(self.clone());
        }

        let mut values = vec![0.0; total * total];
        for i in 0..old {
            values[i * total..i * total + old].copy_from_slice(self.row(i));
        }

        for j in old..total {
            for i in 0..j {
                // Always evaluated as (lower index, higher index), the same
                // orientation a from-scratch build uses.
                let d = metric.distance(&cases[i], &cases[j])?;
                values[i * total + j] = d;
                values[j * total + i] = d;
            }
        }

        Ok(Self {
            size: total,
            values,
        })
    }

    /// Top-left `n x n` block
    #[must_use]
    pub fn truncate(&self, n: usize) -> Self {
        let n = n.min(self.size);
        let mut values = Vec::with_capacity(n * n);
        for i in 0..n {
            values.extend_from_slice(&self.row(i)[..n]);
        }
        Self { size: n, values }
    }
}
