//! Logging utilities
//!
//! Standardized log lines for file operations and clustering runs, so the
//! periodic runner's output can be grepped consistently.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Log an operation start, e.g. `Reading cases data/cases.parquet`
pub fn log_operation_start(operation: &str, target: &Path) {
    log::info!("{} {}", operation, target.display());
}

/// Log an operation completion with an item count and optional timing
pub fn log_operation_complete(operation: &str, target: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {operation} {items} rows at {} in {duration:?}",
            target.display()
        ),
        None => log::info!("Successfully {operation} {items} rows at {}", target.display()),
    }
}

/// Log a warning, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Log the outcome of one clustering run
pub fn log_run_complete(
    run: impl Display,
    cases: usize,
    clusters: usize,
    noise: usize,
    failed_groups: usize,
    elapsed: Duration,
) {
    if failed_groups > 0 {
        log::warn!(
            "{run}: {cases} cases, {clusters} clusters, {noise} noise, {failed_groups} failed groups in {elapsed:?}"
        );
    } else {
        log::info!("{run}: {cases} cases, {clusters} clusters, {noise} noise in {elapsed:?}");
    }
}
