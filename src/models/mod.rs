//! Domain models for outbreak clustering

pub mod case;

pub use case::{Case, CaseKey, GeoPoint};
