//! DBSCAN over a precomputed distance matrix
//!
//! Labels follow the usual conventions: `-1` is noise, clusters are numbered
//! `0..k` in the order they are discovered while scanning points by index.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cache::DistanceMatrix;
use crate::config::{DEFAULT_EPS, DEFAULT_MIN_SAMPLES};
use crate::error::{Error, Result};

/// Label assigned to points outside every dense region
pub const NOISE: i32 = -1;

type Neighbors = SmallVec<[usize; 16]>;

/// DBSCAN parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighborhood radius; a neighbor is any point at distance `<= eps`
    pub eps: f64,
    /// Points (the point itself included) needed in a neighborhood for a core point
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl DbscanParams {
    #[must_use]
    pub const fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(Error::Config(format!(
                "eps must be a positive finite number, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(Error::Config(
                "min_samples must be >= 1; a core point needs at least itself".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a group of `n_points` can contain any cluster at all
    #[must_use]
    pub fn is_viable_for_size(&self, n_points: usize) -> bool {
        n_points >= self.min_samples
    }
}

/// Cluster the points of `matrix`, returning one label per point
#[must_use]
pub fn dbscan(matrix: &DistanceMatrix, params: &DbscanParams) -> Vec<i32> {
    let n = matrix.len();
    let mut labels = vec![NOISE; n];
    if !params.is_viable_for_size(n) {
        return labels;
    }

    let neighborhoods: Vec<Neighbors> = (0..n)
        .map(|i| {
            matrix
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(_, &d)| d <= params.eps)
                .map(|(j, _)| j)
                .collect()
        })
        .collect();
    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|nb| nb.len() >= params.min_samples)
        .collect();

    let mut next_label = 0;
    let mut stack: Vec<usize> = Vec::new();
    for seed in 0..n {
        if labels[seed] != NOISE || !is_core[seed] {
            continue;
        }

        // Border points take the first cluster that reaches them and are
        // never expanded from.
        stack.push(seed);
        while let Some(point) = stack.pop() {
            if labels[point] != NOISE {
                continue;
            }
            labels[point] = next_label;
            if is_core[point] {
                stack.extend(
                    neighborhoods[point]
                        .iter()
                        .copied()
                        .filter(|&v| labels[v] == NOISE),
                );
            }
        }
        next_label += 1;
    }

    labels
}
