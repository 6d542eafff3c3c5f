//! Clustering algorithms
//!
//! 1. Hybrid geo+time distance
//! 2. DBSCAN over a precomputed matrix
//! 3. Per-diagnosis orchestration with global id rebasing
//! 4. Outbreak window pre-filter

pub mod dbscan;
pub mod distance;
pub mod orchestrator;
pub mod window;

// Re-export key types
pub use dbscan::{DbscanParams, NOISE, dbscan};
pub use distance::{HybridMetric, haversine_km};
pub use orchestrator::{ClusterAssignment, ClusterEngine, GroupFailure, GroupReport, LabeledTable};
pub use window::OutbreakWindow;
