//! Spatiotemporal outbreak cluster detection over geotagged disease cases.
//!
//! Cases are grouped by diagnosis and clustered with DBSCAN over a hybrid
//! distance (great-circle km plus a scaled day gap). Per-diagnosis distance
//! matrices are cached and extended incrementally between runs, and cluster
//! ids are rebased into one id space across diagnoses.

pub mod algorithm;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod report;
pub mod synthetic;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ClusterConfig, ColumnConfig};
pub use error::{Error, Result};
pub use models::{Case, CaseKey, GeoPoint};

// Clustering
pub use algorithm::{
    ClusterAssignment, ClusterEngine, DbscanParams, GroupFailure, GroupReport, HybridMetric,
    LabeledTable, NOISE, OutbreakWindow,
};
pub use cache::{CachedMatrix, DistanceMatrix, FileMatrixStore, MatrixStore, MemoryMatrixStore};

// Reporting
pub use report::{ClusterSummary, clustered_only, write_summary_json};

// Arrow types
pub use arrow::record_batch::RecordBatch;

// Utility functions
pub use utils::arrow::{CLUSTER_COLUMN, cases_from_batch, drop_incomplete_rows};
pub use utils::io::{read_case_table, write_table};
