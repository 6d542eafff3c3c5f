//! Case entity model
//!
//! A [`Case`] is one geotagged, dated disease record as seen by the clustering
//! engine. Everything else on the input row (age, gender, neighborhood, ...)
//! stays in the Arrow table and is never read by the algorithm.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check the point is finite and inside the valid degree ranges
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(Error::invalid_input(format!(
                "non-finite coordinates ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::invalid_input(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::invalid_input(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// One disease case
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Row position in the input table
    pub row: usize,
    /// Optional external identifier
    pub id: Option<String>,
    /// Diagnosis label, the partition key for clustering
    pub diagnosis: String,
    /// Where the case was recorded
    pub location: GeoPoint,
    /// When the case was recorded
    pub date: NaiveDate,
}

impl Case {
    #[must_use]
    pub fn new(
        row: usize,
        diagnosis: impl Into<String>,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            row,
            id: None,
            diagnosis: diagnosis.into(),
            location: GeoPoint::new(latitude, longitude),
            date,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Identity of this case as recorded by the distance matrix cache
    #[must_use]
    pub fn key(&self) -> CaseKey {
        CaseKey {
            id: self.id.clone(),
            latitude: self.location.latitude,
            longitude: self.location.longitude,
            date: self.date,
        }
    }
}

/// Cache identity of a case.
///
/// Coordinates and date are part of the key, so an edited case never
/// matches the key it was cached under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseKey {
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
}
