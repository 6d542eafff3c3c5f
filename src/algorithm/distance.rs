//! Hybrid geographic + temporal distance
//!
//! The distance between two cases is the great-circle distance between their
//! locations (km) plus their date gap in days scaled into km-equivalents.
//! With the default weights a 30-day gap counts as 5 km.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Case, GeoPoint};

/// Mean earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default weight applied to the day gap
pub const DEFAULT_TIME_WEIGHT: f64 = 1.0 / 30.0;

/// Default amplification applied on top of the time weight
pub const DEFAULT_TIME_AMPLIFICATION: f64 = 5.0;

/// Great-circle distance between two points in kilometers (haversine)
#[must_use]
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Absolute gap between two dates in whole days
#[must_use]
pub fn day_gap(a: NaiveDate, b: NaiveDate) -> u64 {
    a.signed_duration_since(b).num_days().unsigned_abs()
}

/// Weights of the hybrid distance.
///
/// Always a pseudometric (non-negative, symmetric, zero on identical inputs);
/// the triangle inequality is not guaranteed and DBSCAN does not need it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridMetric {
    /// Weight per day of separation
    pub time_weight: f64,
    /// Fixed factor applied on top of `time_weight`
    pub time_amplification: f64,
}

impl Default for HybridMetric {
    fn default() -> Self {
        Self {
            time_weight: DEFAULT_TIME_WEIGHT,
            time_amplification: DEFAULT_TIME_AMPLIFICATION,
        }
    }
}

impl HybridMetric {
    #[must_use]
    pub const fn new(time_weight: f64, time_amplification: f64) -> Self {
        Self {
            time_weight,
            time_amplification,
        }
    }

    /// Reject weights that would make distances negative or non-finite
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("time_weight", self.time_weight),
            ("time_amplification", self.time_amplification),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Km-equivalent contribution of one day of separation
    #[must_use]
    pub fn km_per_day(&self) -> f64 {
        self.time_weight * self.time_amplification
    }

    /// Distance between two (point, date) pairs
    pub fn between(
        &self,
        a: &GeoPoint,
        a_date: NaiveDate,
        b: &GeoPoint,
        b_date: NaiveDate,
    ) -> Result<f64> {
        a.validate()?;
        b.validate()?;

        let geo = haversine_km(a, b);
        let temporal = day_gap(a_date, b_date) as f64 * self.km_per_day();
        let total = geo + temporal;
        if !total.is_finite() {
            return Err(Error::invalid_input(format!(
                "hybrid distance is not finite (geo {geo}, temporal {temporal})"
            )));
        }
        Ok(total)
    }

    /// Distance between two cases
    pub fn distance(&self, a: &Case, b: &Case) -> Result<f64> {
        self.between(&a.location, a.date, &b.location, b.date)
    }
}
