//! High-frequency job detection.

use crate::models::{FrequentJobRuns, GroupKey, JobRun, RunSummary};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Whether `run` finished within `timeframe` before `now`.
///
/// Runs still in progress are never recent.
pub fn is_recent(run: &JobRun, timeframe: Duration, now: DateTime<Utc>) -> bool {
    match run.end_time {
        Some(end) => now - end <= timeframe,
        None => false,
    }
}

/// Group recent runs by (job, owner) and keep the groups with more than
/// `count_threshold` members.
///
/// Groups come back ordered by key, members in input order.
pub fn frequent_job_runs(
    runs: &[JobRun],
    count_threshold: usize,
    timeframe: Duration,
    now: DateTime<Utc>,
) -> FrequentJobRuns {
    let mut grouped: BTreeMap<GroupKey, Vec<RunSummary>> = BTreeMap::new();

    for run in runs.iter().filter(|r| is_recent(r, timeframe, now)) {
        grouped.entry(run.group_key()).or_default().push(run.summary());
    }

    grouped
        .into_iter()
        .filter(|(_, members)| members.len() > count_threshold)
        .collect()
}
