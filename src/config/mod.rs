//! Configuration for the clustering engine.
//!
//! A [`ClusterConfig`] is usually built from [`Default`], optionally loaded
//! from a JSON file, and then patched from `OUTBREAK_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::dbscan::DbscanParams;
use crate::algorithm::distance::HybridMetric;
use crate::error::{Error, Result};
use crate::error::util::safe_open_file;

/// Default DBSCAN neighborhood radius, in km-equivalent units
pub const DEFAULT_EPS: f64 = 5.0;

/// Default DBSCAN minimum neighborhood size (point itself included)
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Default half-width of an outbreak window, in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Names of the columns the engine reads from a case table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Diagnosis (partition key), Utf8
    pub diagnosis: String,
    /// Latitude in degrees, Float64
    pub latitude: String,
    /// Longitude in degrees, Float64
    pub longitude: String,
    /// Case date, Date32
    pub date: String,
    /// Optional stable case identifier, folded into the cache identity
    pub id: Option<String>,
    /// Optional neighborhood column used by the summary report
    pub neighborhood: Option<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            diagnosis: "diagnosis".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            date: "date".to_string(),
            id: None,
            neighborhood: Some("neighborhood".to_string()),
        }
    }
}

impl ColumnConfig {
    /// The columns a case row cannot be clustered without
    #[must_use]
    pub fn required(&self) -> [&str; 4] {
        [
            self.diagnosis.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.date.as_str(),
        ]
    }
}

/// Configuration for a clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Weights of the hybrid geo+time distance
    pub metric: HybridMetric,
    /// DBSCAN neighborhood radius (same units as the metric output)
    pub eps: f64,
    /// DBSCAN minimum neighborhood size
    pub min_samples: usize,
    /// Column names of the case table
    pub columns: ColumnConfig,
    /// Directory for persisted distance matrices; in-memory cache when unset
    pub cache_dir: Option<PathBuf>,
    /// Cluster diagnosis groups on the rayon pool
    pub parallel: bool,
    /// Worker threads for the dedicated pool (defaults to the CPU count)
    pub threads: Option<usize>,
    /// Default half-width for windowed runs, in days
    pub window_days: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            metric: HybridMetric::default(),
            eps: DEFAULT_EPS,
            min_samples: DEFAULT_MIN_SAMPLES,
            columns: ColumnConfig::default(),
            cache_dir: None,
            parallel: true,
            threads: None,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl ClusterConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = safe_open_file(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        log::info!("Loaded clustering configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `OUTBREAK_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("OUTBREAK_EPS") {
            self.eps = parse_override("OUTBREAK_EPS", &value)?;
        }
        if let Some(value) = lookup("OUTBREAK_MIN_SAMPLES") {
            self.min_samples = parse_override("OUTBREAK_MIN_SAMPLES", &value)?;
        }
        if let Some(value) = lookup("OUTBREAK_TIME_WEIGHT") {
            self.metric.time_weight = parse_override("OUTBREAK_TIME_WEIGHT", &value)?;
        }
        if let Some(value) = lookup("OUTBREAK_WINDOW_DAYS") {
            self.window_days = parse_override("OUTBREAK_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = lookup("OUTBREAK_CACHE_DIR") {
            self.cache_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        Ok(self)
    }

    /// Check that the configuration describes a usable clustering run
    pub fn validate(&self) -> Result<()> {
        DbscanParams::new(self.eps, self.min_samples).validate()?;
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be >= 1 when set".to_string()));
        }
        self.metric.validate()
    }

    /// Number of worker threads for a dedicated pool
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has an unparseable value '{value}'")))
}
