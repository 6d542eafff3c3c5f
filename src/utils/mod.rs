//! Utility functions and helpers

pub mod arrow;
pub mod io;
pub mod logging;
