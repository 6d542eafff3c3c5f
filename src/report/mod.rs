//! Summaries of labeled case tables
//!
//! A [`ClusterSummary`] holds the per-diagnosis counts behind the case charts
//! and the per-cluster geometry behind the map layers. It is computed from a
//! labeled table and published as JSON.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use arrow::array::{BooleanArray, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::algorithm::dbscan::NOISE;
use crate::config::ColumnConfig;
use crate::error::util::downcast_array;
use crate::error::{Error, Result};
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::models::Case;
use crate::utils::arrow::cases::{CLUSTER_COLUMN, cases_from_batch, cluster_labels, column_as};
use crate::utils::io::atomic::write_json_atomic;
use crate::utils::io::write_table;

/// Label used for rows without a neighborhood value
pub const UNKNOWN_NEIGHBORHOOD: &str = "unknown";

/// Share of a diagnosis' cases in one neighborhood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodShare {
    pub neighborhood: String,
    pub cases: usize,
    /// Percentage of the diagnosis' cases, 0-100
    pub percentage: f64,
}

/// Case counts for one diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSummary {
    pub diagnosis: String,
    pub cases: usize,
    pub clustered: usize,
    pub noise: usize,
    pub clusters: usize,
    /// Largest neighborhoods first; empty when the table has no neighborhood column
    pub neighborhoods: Vec<NeighborhoodShare>,
}

/// One cluster's size and extent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDetail {
    pub id: i32,
    pub diagnosis: String,
    pub size: usize,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Summary of one labeled table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_cases: usize,
    pub total_clusters: usize,
    pub total_noise: usize,
    /// Sorted by diagnosis
    pub diagnoses: Vec<DiagnosisSummary>,
    /// Sorted by cluster id
    pub clusters: Vec<ClusterDetail>,
}

impl ClusterSummary {
    /// Summarize cases and their labels (index-aligned).
    ///
    /// `neighborhoods`, when given, is index-aligned with `cases` too.
    pub fn from_cases(
        cases: &[Case],
        labels: &[i32],
        neighborhoods: Option<&[Option<String>]>,
    ) -> Result<Self> {
        if labels.len() != cases.len() {
            return Err(Error::invalid_input(format!(
                "{} labels for {} cases",
                labels.len(),
                cases.len()
            )));
        }
        if let Some(n) = neighborhoods {
            if n.len() != cases.len() {
                return Err(Error::invalid_input(format!(
                    "{} neighborhoods for {} cases",
                    n.len(),
                    cases.len()
                )));
            }
        }

        let mut by_diagnosis: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut by_cluster: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (idx, (case, &label)) in cases.iter().zip(labels).enumerate() {
            by_diagnosis.entry(case.diagnosis.as_str()).or_default().push(idx);
            if label != NOISE {
                by_cluster.entry(label).or_default().push(idx);
            }
        }

        let diagnoses = by_diagnosis
            .into_iter()
            .map(|(diagnosis, rows)| {
                let noise = rows.iter().filter(|&&i| labels[i] == NOISE).count();
                let clusters: HashSet<i32> = rows
                    .iter()
                    .map(|&i| labels[i])
                    .filter(|&l| l != NOISE)
                    .collect();
                DiagnosisSummary {
                    diagnosis: diagnosis.to_string(),
                    cases: rows.len(),
                    clustered: rows.len() - noise,
                    noise,
                    clusters: clusters.len(),
                    neighborhoods: neighborhoods
                        .map(|n| neighborhood_shares(&rows, n))
                        .unwrap_or_default(),
                }
            })
            .collect_vec();

        let clusters = by_cluster
            .into_iter()
            .map(|(id, rows)| cluster_detail(id, &rows, cases))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            total_cases: cases.len(),
            total_clusters: clusters.len(),
            total_noise: labels.iter().filter(|&&l| l == NOISE).count(),
            diagnoses,
            clusters,
        })
    }

    /// Summarize a labeled table (one with a `cluster` column)
    pub fn from_batch(batch: &RecordBatch, columns: &ColumnConfig) -> Result<Self> {
        let cases = cases_from_batch(batch, columns)?;
        let labels = cluster_labels(batch)?;
        let neighborhoods = match &columns.neighborhood {
            Some(name) if batch.schema().index_of(name).is_ok() => {
                Some(neighborhood_column(batch, name)?)
            }
            _ => None,
        };
        Self::from_cases(&cases, &labels, neighborhoods.as_deref())
    }

    /// Publish the summary as JSON, replacing `path` atomically
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        log::info!(
            "Wrote summary of {} clusters to {}",
            self.total_clusters,
            path.display()
        );
        Ok(())
    }
}

impl std::fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cluster Summary:")?;
        writeln!(f, "  Total Cases: {}", self.total_cases)?;
        writeln!(f, "  Total Clusters: {}", self.total_clusters)?;
        writeln!(f, "  Noise Cases: {}", self.total_noise)?;
        for d in &self.diagnoses {
            writeln!(
                f,
                "  {}: {} cases, {} clusters, {} clustered, {} noise",
                d.diagnosis, d.cases, d.clusters, d.clustered, d.noise
            )?;
            for share in d.neighborhoods.iter().take(5) {
                writeln!(
                    f,
                    "    {}: {} ({:.1}%)",
                    share.neighborhood, share.cases, share.percentage
                )?;
            }
        }
        Ok(())
    }
}

/// Summarize a labeled table and publish the summary to `path`
pub fn write_summary_json(batch: &RecordBatch, columns: &ColumnConfig, path: &Path) -> Result<ClusterSummary> {
    let summary = ClusterSummary::from_batch(batch, columns)?;
    summary.write_json(path)?;
    Ok(summary)
}

/// Publish a labeled table to `output`, then its summary to `summary_path`.
///
/// The summary is computed before anything is written and published last, so
/// a failed table write leaves both previous artifacts in place.
pub fn publish_labeled(
    batch: &RecordBatch,
    columns: &ColumnConfig,
    output: &Path,
    summary_path: Option<&Path>,
    drop_noise: bool,
) -> Result<Option<ClusterSummary>> {
    let summary = summary_path
        .map(|_| ClusterSummary::from_batch(batch, columns))
        .transpose()?;

    if drop_noise {
        write_table(output, &clustered_only(batch)?)?;
    } else {
        write_table(output, batch)?;
    }

    if let (Some(path), Some(summary)) = (summary_path, &summary) {
        summary.write_json(path)?;
    }
    Ok(summary)
}

fn neighborhood_shares(rows: &[usize], neighborhoods: &[Option<String>]) -> Vec<NeighborhoodShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &i in rows {
        let name = neighborhoods[i].as_deref().unwrap_or(UNKNOWN_NEIGHBORHOOD);
        *counts.entry(name).or_insert(0) += 1;
    }

    let total = rows.len() as f64;
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .map(|(name, cases)| NeighborhoodShare {
            neighborhood: name.to_string(),
            cases,
            percentage: cases as f64 / total * 100.0,
        })
        .collect()
}

fn cluster_detail(id: i32, rows: &[usize], cases: &[Case]) -> Result<ClusterDetail> {
    let members = rows.iter().map(|&i| &cases[i]).collect_vec();
    let (Some(first), Some(last)) = (
        members.iter().map(|c| c.date).min(),
        members.iter().map(|c| c.date).max(),
    ) else {
        return Err(Error::invalid_input(format!("cluster {id} has no members")));
    };

    // Diagnoses never share an id after rebasing
    let diagnosis = members[0].diagnosis.clone();
    let size = members.len() as f64;
    Ok(ClusterDetail {
        id,
        diagnosis,
        size: members.len(),
        centroid_latitude: members.iter().map(|c| c.location.latitude).sum::<f64>() / size,
        centroid_longitude: members.iter().map(|c| c.location.longitude).sum::<f64>() / size,
        first_date: first,
        last_date: last,
    })
}

fn neighborhood_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let column = column_as(batch, name, &DataType::Utf8)?;
    let values = downcast_array::<StringArray>(&column, name, "Utf8")?;
    Ok(values.iter().map(|v| v.map(str::to_string)).collect())
}

/// Rows of a labeled table that belong to a cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusteredOnlyFilter;

impl BatchFilter for ClusteredOnlyFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let labels = cluster_labels(batch)?;
        let mask: BooleanArray = labels.iter().map(|&l| Some(l != NOISE)).collect();
        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        HashSet::from([CLUSTER_COLUMN.to_string()])
    }
}

/// Drop noise rows from a labeled table
pub fn clustered_only(batch: &RecordBatch) -> Result<RecordBatch> {
    ClusteredOnlyFilter.filter(batch)
}
