//! Synthetic case generator for demos and tests.
//!
//! Cases are placed around named neighborhood anchor points with Gaussian
//! jitter and dated uniformly inside a range. The same seed always produces
//! the same table.
//!
//! # Example
//!
//! ```rust
//! use outbreak_cluster::synthetic::SyntheticScenario;
//!
//! let scenario = SyntheticScenario {
//!     count: 50,
//!     seed: 7,
//!     ..SyntheticScenario::default()
//! };
//! let cases = scenario.generate().unwrap();
//! assert_eq!(cases.len(), 50);
//! ```

use std::f64::consts::PI;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ColumnConfig;
use crate::error::{Error, Result};
use crate::models::GeoPoint;
use crate::utils::arrow::cases::date_to_days;

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

const GENDERS: [&str; 2] = ["F", "M"];

/// A named area with the points cases are scattered around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub name: String,
    pub anchors: Vec<GeoPoint>,
}

impl Neighborhood {
    #[must_use]
    pub fn new(name: impl Into<String>, anchors: &[(f64, f64)]) -> Self {
        Self {
            name: name.into(),
            anchors: anchors
                .iter()
                .map(|&(lat, lon)| GeoPoint::new(lat, lon))
                .collect(),
        }
    }
}

/// Neighborhoods of Joinville (SC, Brazil) with three anchors each
#[must_use]
pub fn joinville_neighborhoods() -> Vec<Neighborhood> {
    vec![
        Neighborhood::new("Centro", &[(-26.3044, -48.8487), (-26.3300, -48.8300), (-26.2800, -48.8700)]),
        Neighborhood::new("Zona Norte", &[(-26.2777, -48.8478), (-26.2520, -48.8200), (-26.3000, -48.8700)]),
        Neighborhood::new("Zona Sul", &[(-26.3530, -48.8480), (-26.3800, -48.8700), (-26.3400, -48.8200)]),
        Neighborhood::new("Boa Vista", &[(-26.2920, -48.8350), (-26.2700, -48.8200), (-26.3100, -48.8700)]),
        Neighborhood::new("Saguaçu", &[(-26.3039, -48.8741), (-26.2800, -48.8500), (-26.3250, -48.8950)]),
        Neighborhood::new("Boehmerwald", &[(-26.3353, -48.8214), (-26.3600, -48.8000), (-26.3100, -48.8400)]),
        Neighborhood::new("Comerciário", &[(-26.3350, -48.8500), (-26.3450, -48.8700), (-26.2950, -48.8200)]),
        Neighborhood::new("Iririú", &[(-26.3143, -48.8652), (-26.2900, -48.8400), (-26.3350, -48.8900)]),
        Neighborhood::new("Petrópolis", &[(-26.2950, -48.8550), (-26.2800, -48.8400), (-26.3250, -48.8900)]),
        Neighborhood::new("Anita Garibaldi", &[(-26.3190, -48.8727), (-26.2950, -48.8500), (-26.3400, -48.8950)]),
    ]
}

/// One generated case with its auxiliary attributes
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticCase {
    pub id: String,
    pub diagnosis: String,
    pub location: GeoPoint,
    pub date: NaiveDate,
    pub neighborhood: String,
    pub age: i32,
    pub gender: &'static str,
    pub weight_kg: f64,
    pub height_m: f64,
}

/// Scenario configuration for generating synthetic cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticScenario {
    /// Number of cases to generate.
    pub count: usize,
    pub diagnoses: Vec<String>,
    pub neighborhoods: Vec<Neighborhood>,
    /// First possible case date (inclusive).
    pub start: NaiveDate,
    /// Last possible case date (inclusive).
    pub end: NaiveDate,
    /// Standard deviation of the offset from the anchor, in meters.
    pub jitter_sigma_meters: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            count: 200,
            diagnoses: ["COVID", "Dengue", "Influenza", "Zika"]
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
            neighborhoods: joinville_neighborhoods(),
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap_or_default(),
            jitter_sigma_meters: 400.0,
            seed: 42,
        }
    }
}

impl SyntheticScenario {
    fn validate(&self) -> Result<()> {
        if self.diagnoses.is_empty() {
            return Err(Error::invalid_input("scenario has no diagnoses"));
        }
        if self.neighborhoods.is_empty() || self.neighborhoods.iter().any(|n| n.anchors.is_empty()) {
            return Err(Error::invalid_input("every neighborhood needs at least one anchor"));
        }
        if self.start > self.end {
            return Err(Error::invalid_input(format!(
                "date range starts ({}) after it ends ({})",
                self.start, self.end
            )));
        }
        if !self.jitter_sigma_meters.is_finite() || self.jitter_sigma_meters < 0.0 {
            return Err(Error::invalid_input("jitter must be a non-negative number of meters"));
        }
        Ok(())
    }

    /// Generate the scenario's cases
    pub fn generate(&self) -> Result<Vec<SyntheticCase>> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let span = u64::try_from((self.end - self.start).num_days()).unwrap_or(0);

        let mut cases = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let neighborhood = &self.neighborhoods[rng.random_range(0..self.neighborhoods.len())];
            let anchor = neighborhood.anchors[rng.random_range(0..neighborhood.anchors.len())];
            let date = self
                .start
                .checked_add_days(Days::new(rng.random_range(0..=span)))
                .unwrap_or(self.end);
            let gender = GENDERS[rng.random_range(0..GENDERS.len())];
            let height_m: f64 = rng.random_range(1.50..1.95);

            cases.push(SyntheticCase {
                id: format!("case_{i:05}"),
                diagnosis: self.diagnoses[rng.random_range(0..self.diagnoses.len())].clone(),
                location: jitter(anchor, self.jitter_sigma_meters, &mut rng),
                date,
                neighborhood: neighborhood.name.clone(),
                age: rng.random_range(1..90),
                gender,
                weight_kg: (height_m * height_m * rng.random_range(18.0_f64..32.0) * 10.0).round() / 10.0,
                height_m: (height_m * 100.0).round() / 100.0,
            });
        }
        Ok(cases)
    }

    /// Generate the scenario as a case table using the given column names
    pub fn generate_batch(&self, columns: &ColumnConfig) -> Result<RecordBatch> {
        to_record_batch(&self.generate()?, columns)
    }
}

/// Gaussian offset around `anchor` (Box-Muller)
fn jitter(anchor: GeoPoint, sigma_meters: f64, rng: &mut StdRng) -> GeoPoint {
    if sigma_meters <= 0.0 {
        return anchor;
    }
    let u1: f64 = rng.random_range(0.0001..1.0);
    let u2: f64 = rng.random();
    let radius = (-2.0 * u1.ln()).sqrt() * sigma_meters;
    let north = radius * (2.0 * PI * u2).cos();
    let east = radius * (2.0 * PI * u2).sin();

    let meters_per_deg_lon = METERS_PER_DEG_LAT * anchor.latitude.to_radians().cos();
    let d_lon = if meters_per_deg_lon.abs() < 1e-10 {
        0.0
    } else {
        east / meters_per_deg_lon
    };
    GeoPoint::new(
        (anchor.latitude + north / METERS_PER_DEG_LAT).clamp(-90.0, 90.0),
        (anchor.longitude + d_lon).clamp(-180.0, 180.0),
    )
}

/// Build a case table from generated cases
pub fn to_record_batch(cases: &[SyntheticCase], columns: &ColumnConfig) -> Result<RecordBatch> {
    let id_column = columns.id.clone().unwrap_or_else(|| "id".to_string());
    let neighborhood_column = columns
        .neighborhood
        .clone()
        .unwrap_or_else(|| "neighborhood".to_string());

    let schema = Arc::new(Schema::new(vec![
        Field::new(id_column, DataType::Utf8, false),
        Field::new(&columns.diagnosis, DataType::Utf8, false),
        Field::new(&columns.latitude, DataType::Float64, false),
        Field::new(&columns.longitude, DataType::Float64, false),
        Field::new(&columns.date, DataType::Date32, false),
        Field::new(neighborhood_column, DataType::Utf8, false),
        Field::new("age", DataType::Int32, false),
        Field::new("gender", DataType::Utf8, false),
        Field::new("weight", DataType::Float64, false),
        Field::new("height", DataType::Float64, false),
    ]));

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(cases.iter().map(|c| c.id.as_str()))),
        Arc::new(StringArray::from_iter_values(cases.iter().map(|c| c.diagnosis.as_str()))),
        Arc::new(Float64Array::from_iter_values(cases.iter().map(|c| c.location.latitude))),
        Arc::new(Float64Array::from_iter_values(cases.iter().map(|c| c.location.longitude))),
        Arc::new(Date32Array::from_iter_values(cases.iter().map(|c| date_to_days(c.date)))),
        Arc::new(StringArray::from_iter_values(cases.iter().map(|c| c.neighborhood.as_str()))),
        Arc::new(Int32Array::from_iter_values(cases.iter().map(|c| c.age))),
        Arc::new(StringArray::from_iter_values(cases.iter().map(|c| c.gender))),
        Arc::new(Float64Array::from_iter_values(cases.iter().map(|c| c.weight_kg))),
        Arc::new(Float64Array::from_iter_values(cases.iter().map(|c| c.height_m))),
    ];

    Ok(RecordBatch::try_new(schema, arrays)?)
}
