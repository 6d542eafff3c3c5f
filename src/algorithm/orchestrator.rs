//! Per-diagnosis clustering with a global cluster id space
//!
//! A run partitions cases by diagnosis, clusters each group independently on
//! its (cached) distance matrix, and folds the groups in diagnosis order to
//! rebase local cluster ids into one id space. Group jobs may run on rayon;
//! the fold is always sequential, so identical inputs give identical ids.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use arrow::array::BooleanArray;
use arrow::record_batch::RecordBatch;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::algorithm::dbscan::{DbscanParams, NOISE, dbscan};
use crate::algorithm::distance::HybridMetric;
use crate::cache::{CacheOutcome, FileMatrixStore, MatrixStore, MemoryMatrixStore, extend_or_rebuild};
use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::filter::core::filter_record_batch;
use crate::models::Case;
use crate::utils::arrow::cases::{cases_from_batch, empty_labeled, with_cluster_column};
use crate::utils::logging::{finish_progress_bar, log_run_complete, progress_bar_if};

/// A diagnosis group whose clustering failed
#[derive(Debug)]
pub struct GroupFailure {
    pub diagnosis: String,
    pub error: Error,
}

/// Statistics for one successfully clustered group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub diagnosis: String,
    pub cases: usize,
    pub clusters: usize,
    pub noise: usize,
    /// First global id assigned to this group's clusters
    pub offset: i32,
    pub cache: CacheOutcome,
}

/// Labels for one run, index-aligned with the input cases.
///
/// Cases of a failed group have no label.
#[derive(Debug, Default)]
pub struct ClusterAssignment {
    pub labels: Vec<Option<i32>>,
    pub groups: Vec<GroupReport>,
    pub failures: Vec<GroupFailure>,
}

impl ClusterAssignment {
    /// True when every group clustered successfully
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of distinct clusters across all groups
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.groups.iter().map(|g| g.clusters).sum()
    }

    /// Number of cases labeled as noise
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.groups.iter().map(|g| g.noise).sum()
    }

    /// All labels, or the first group failure
    pub fn into_labels(mut self) -> Result<Vec<i32>> {
        if let Some(failure) = self.failures.drain(..).next() {
            return Err(Error::group_failed(failure.diagnosis, failure.error));
        }
        Ok(self.labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect())
    }
}

/// A labeled case table plus the groups that could not be labeled
#[derive(Debug)]
pub struct LabeledTable {
    /// Input rows (minus rows of failed groups) with a `cluster` column
    pub batch: RecordBatch,
    pub groups: Vec<GroupReport>,
    pub failures: Vec<GroupFailure>,
}

impl LabeledTable {
    pub(crate) fn empty(batch: &RecordBatch) -> Self {
        Self {
            batch: empty_labeled(&batch.schema()),
            groups: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The labeled batch, or the first group failure
    pub fn into_complete(mut self) -> Result<RecordBatch> {
        match self.failures.drain(..).next() {
            Some(failure) => Err(Error::group_failed(failure.diagnosis, failure.error)),
            None => Ok(self.batch),
        }
    }
}

/// Shift a group's local labels by `offset`.
///
/// Returns the rebased labels and the offset for the next group. Noise stays
/// noise and an all-noise group leaves the offset unchanged.
#[must_use]
pub fn rebase_labels(local: &[i32], offset: i32) -> (Vec<i32>, i32) {
    let rebased = local
        .iter()
        .map(|&label| if label == NOISE { NOISE } else { label + offset })
        .collect();
    let next = local
        .iter()
        .copied()
        .max()
        .filter(|&max| max != NOISE)
        .map_or(offset, |max| offset + max + 1);
    (rebased, next)
}

/// Indices of `cases` grouped by diagnosis, sorted by diagnosis name
#[must_use]
pub fn partition_by_diagnosis(cases: &[Case]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, case) in cases.iter().enumerate() {
        groups.entry(case.diagnosis.as_str()).or_default().push(idx);
    }
    groups
}

/// Local labels for one group plus how its matrix was obtained
fn label_group(
    diagnosis: &str,
    cases: &[Case],
    store: &dyn MatrixStore,
    metric: &HybridMetric,
    params: &DbscanParams,
) -> Result<(Vec<i32>, CacheOutcome)> {
    let cached = store.load(diagnosis)?;
    let (entry, outcome) = extend_or_rebuild(diagnosis, cached, cases, metric)?;
    if outcome.needs_save() {
        if let Err(e) = store.save(&entry) {
            // The labels are still correct; the next run just recomputes more
            warn!("Failed to persist matrix for '{diagnosis}': {e}");
        }
    }
    Ok((dbscan(&entry.matrix, params), outcome))
}

/// The clustering engine.
///
/// Holds the matrix cache and serializes runs: at most one run executes at a
/// time per engine.
pub struct ClusterEngine {
    config: ClusterConfig,
    params: DbscanParams,
    store: Arc<dyn MatrixStore>,
    pool: Option<rayon::ThreadPool>,
    run_lock: Mutex<()>,
    show_progress: bool,
}

impl std::fmt::Debug for ClusterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterEngine")
            .field("config", &self.config)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ClusterEngine {
    /// Create an engine; persists matrices under `config.cache_dir` when set
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let store: Arc<dyn MatrixStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileMatrixStore::new(dir)?),
            None => Arc::new(MemoryMatrixStore::new()),
        };
        Self::with_store(config, store)
    }

    /// Create an engine backed by a specific matrix store
    pub fn with_store(config: ClusterConfig, store: Arc<dyn MatrixStore>) -> Result<Self> {
        config.validate()?;
        let params = DbscanParams::new(config.eps, config.min_samples);

        let pool = match (config.parallel, config.threads) {
            (true, Some(_)) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.thread_count())
                    .build()
                    .map_err(|e| Error::Config(format!("failed to build thread pool: {e}")))?,
            ),
            _ => None,
        };

        Ok(Self {
            config,
            params,
            store,
            pool,
            run_lock: Mutex::new(()),
            show_progress: false,
        })
    }

    /// Show a progress bar over diagnosis groups
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    #[must_use]
    pub fn params(&self) -> &DbscanParams {
        &self.params
    }

    /// The persistent matrix store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MatrixStore> {
        &self.store
    }

    /// Cluster `cases`, reusing and updating the persistent matrix cache
    pub fn cluster_cases(&self, cases: &[Case]) -> Result<ClusterAssignment> {
        let _guard = self.run_lock.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(self.run("Full clustering run", cases, self.store.as_ref()))
    }

    /// Cluster a validated case table, appending a `cluster` column
    pub fn cluster_batch(&self, batch: &RecordBatch) -> Result<LabeledTable> {
        let _guard = self.run_lock.lock().map_err(|_| Error::LockPoisoned)?;
        self.label_batch("Full clustering run", batch, self.store.as_ref())
    }

    /// Cluster with a throwaway in-memory cache.
    ///
    /// Used for subsets (windows) whose cases are not a stable prefix of the
    /// full dataset and must not disturb the persistent cache.
    pub(crate) fn cluster_transient(&self, run: &str, cases: &[Case]) -> Result<ClusterAssignment> {
        let _guard = self.run_lock.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(self.run(run, cases, &MemoryMatrixStore::new()))
    }

    pub(crate) fn cluster_batch_transient(&self, run: &str, batch: &RecordBatch) -> Result<LabeledTable> {
        let _guard = self.run_lock.lock().map_err(|_| Error::LockPoisoned)?;
        self.label_batch(run, batch, &MemoryMatrixStore::new())
    }

    fn label_batch(&self, run: &str, batch: &RecordBatch, store: &dyn MatrixStore) -> Result<LabeledTable> {
        if batch.num_rows() == 0 {
            return Ok(LabeledTable::empty(batch));
        }

        let cases = cases_from_batch(batch, &self.config.columns)?;
        let assignment = self.run(run, &cases, store);

        let labeled = if assignment.is_complete() {
            let labels: Vec<i32> = assignment.labels.iter().map(|l| l.unwrap_or(NOISE)).collect();
            with_cluster_column(batch, &labels)?
        } else {
            let mask: BooleanArray = assignment.labels.iter().map(|l| Some(l.is_some())).collect();
            let kept = filter_record_batch(batch, &mask)?;
            let labels: Vec<i32> = assignment.labels.iter().filter_map(|l| *l).collect();
            with_cluster_column(&kept, &labels)?
        };

        Ok(LabeledTable {
            batch: labeled,
            groups: assignment.groups,
            failures: assignment.failures,
        })
    }

    fn run(&self, run: &str, cases: &[Case], store: &dyn MatrixStore) -> ClusterAssignment {
        let start = Instant::now();
        let mut assignment = ClusterAssignment {
            labels: vec![None; cases.len()],
            ..ClusterAssignment::default()
        };
        if cases.is_empty() {
            debug!("{run}: no cases, nothing to cluster");
            return assignment;
        }

        let groups: Vec<(&str, Vec<usize>)> = partition_by_diagnosis(cases).into_iter().collect();
        info!("{run}: {} cases in {} diagnosis groups", cases.len(), groups.len());

        let pb = progress_bar_if(self.show_progress, groups.len() as u64, Some(run));
        let results = self.label_groups(&groups, cases, store, &pb);
        finish_progress_bar(&pb, Some("Clustering complete"));

        let mut offset = 0;
        for ((diagnosis, indices), result) in groups.iter().zip(results) {
            match result {
                Ok((local, cache)) => {
                    let (rebased, next) = rebase_labels(&local, offset);
                    let noise = rebased.iter().filter(|&&l| l == NOISE).count();
                    for (&idx, label) in indices.iter().zip(rebased) {
                        assignment.labels[idx] = Some(label);
                    }
                    debug!(
                        "'{diagnosis}': {} cases, {} clusters from id {offset}, {noise} noise ({cache:?})",
                        indices.len(),
                        next - offset
                    );
                    assignment.groups.push(GroupReport {
                        diagnosis: (*diagnosis).to_string(),
                        cases: indices.len(),
                        clusters: (next - offset) as usize,
                        noise,
                        offset,
                        cache,
                    });
                    offset = next;
                }
                Err(error) => {
                    warn!("Clustering failed for '{diagnosis}': {error}");
                    assignment.failures.push(GroupFailure {
                        diagnosis: (*diagnosis).to_string(),
                        error,
                    });
                }
            }
        }

        log_run_complete(
            run,
            cases.len(),
            assignment.cluster_count(),
            assignment.noise_count(),
            assignment.failures.len(),
            start.elapsed(),
        );
        assignment
    }

    fn label_groups(
        &self,
        groups: &[(&str, Vec<usize>)],
        cases: &[Case],
        store: &dyn MatrixStore,
        pb: &ProgressBar,
    ) -> Vec<Result<(Vec<i32>, CacheOutcome)>> {
        let metric = &self.config.metric;
        let params = &self.params;
        let job = |(diagnosis, indices): &(&str, Vec<usize>)| {
            let members: Vec<Case> = indices.iter().map(|&i| cases[i].clone()).collect();
            let result = label_group(diagnosis, &members, store, metric, params);
            pb.inc(1);
            result
        };

        if !self.config.parallel {
            return groups.iter().map(job).collect();
        }
        match &self.pool {
            Some(pool) => pool.install(|| groups.par_iter().map(job).collect()),
            None => groups.par_iter().map(job).collect(),
        }
    }
}
