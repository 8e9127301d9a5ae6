//! Long-running job detection.

use crate::models::JobRun;
use chrono::Duration;

/// Keep the runs whose runtime is strictly greater than `threshold`.
///
/// Unfinished runs have a zero runtime and never exceed a positive
/// threshold. Input order is preserved.
pub fn exceeding_duration(runs: &[JobRun], threshold: Duration) -> Vec<JobRun> {
    runs.iter()
        .filter(|run| run.runtime() > threshold)
        .cloned()
        .collect()
}
