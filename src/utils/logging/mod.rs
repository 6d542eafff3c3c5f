//! Logging utilities for output and progress tracking

pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use log::{log_operation_complete, log_operation_start, log_run_complete, log_warning};
pub use progress::{create_main_progress_bar, finish_progress_bar, progress_bar_if};
