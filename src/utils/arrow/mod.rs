//! Arrow helpers for case tables

pub mod cases;

pub use cases::{
    CLUSTER_COLUMN, cases_from_batch, cluster_labels, drop_incomplete_rows, with_cluster_column,
};
