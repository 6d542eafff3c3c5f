//! Row filters over case tables
//!
//! Filters implement [`BatchFilter`] and keep the input schema, so they can be
//! chained in front of the clustering engine or applied to labeled output.

pub mod core;
pub mod date;

pub use core::{BatchFilter, filter_record_batch};
pub use date::DateRangeFilter;
