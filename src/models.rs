//! Data models for job-run analysis.
//!
//! This module contains the run records fetched from the Jobs API and the
//! structures a single analysis pass produces from them.

use chrono::{DateTime, Duration, Utc};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One execution of a scheduled job.
///
/// Records are validated when converted from the wire format, so
/// `start_time` is always present and `end_time`, when set, is never
/// earlier than `start_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    /// Unique identifier of this run.
    pub run_id: String,
    /// Identifier of the job definition the run belongs to.
    pub job_id: String,
    /// Principal that owns the run.
    pub creator_user_name: String,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run finished. `None` while in progress or when no
    /// completion was recorded.
    pub end_time: Option<DateTime<Utc>>,
}

impl JobRun {
    /// Elapsed wall-clock time, zero if the run has not ended.
    pub fn runtime(&self) -> Duration {
        match self.end_time {
            Some(end) => (end - self.start_time).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    /// The (job, owner) pair this run is counted under.
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            job_id: self.job_id.clone(),
            creator_user_name: self.creator_user_name.clone(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            runtime: self.runtime(),
        }
    }
}

/// Compound grouping key for the frequency rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub job_id: String,
    pub creator_user_name: String,
}

impl GroupKey {
    #[allow(dead_code)] // Convenience constructor for lookups
    pub fn new(job_id: impl Into<String>, creator_user_name: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            creator_user_name: creator_user_name.into(),
        }
    }
}

/// A qualifying run inside a frequency-flagged group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "runtime_seconds", serialize_with = "serialize_seconds")]
    pub runtime: Duration,
}

fn serialize_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_seconds())
}

/// Frequency-flagged groups, ordered by key.
///
/// Serializes as a list of `{job_id, creator_user_name, runs}` objects since
/// JSON map keys cannot carry a compound key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequentJobRuns {
    groups: BTreeMap<GroupKey, Vec<RunSummary>>,
}

impl FrequentJobRuns {
    #[allow(dead_code)] // Lookup for callers inspecting a single group
    pub fn get(&self, key: &GroupKey) -> Option<&[RunSummary]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, GroupKey, Vec<RunSummary>> {
        self.groups.iter()
    }
}

impl<'a> IntoIterator for &'a FrequentJobRuns {
    type Item = (&'a GroupKey, &'a Vec<RunSummary>);
    type IntoIter = btree_map::Iter<'a, GroupKey, Vec<RunSummary>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl FromIterator<(GroupKey, Vec<RunSummary>)> for FrequentJobRuns {
    fn from_iter<I: IntoIterator<Item = (GroupKey, Vec<RunSummary>)>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

impl Serialize for FrequentJobRuns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Group<'a>(&'a GroupKey, &'a [RunSummary]);

        impl Serialize for Group<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut state = serializer.serialize_struct("Group", 3)?;
                state.serialize_field("job_id", &self.0.job_id)?;
                state.serialize_field("creator_user_name", &self.0.creator_user_name)?;
                state.serialize_field("runs", self.1)?;
                state.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.groups.len()))?;
        for (key, runs) in &self.groups {
            seq.serialize_element(&Group(key, runs))?;
        }
        seq.end()
    }
}

/// Output of the two detection rules for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// Runs whose runtime exceeded the duration threshold, in fetch order.
    pub exceeded_duration: Vec<JobRun>,
    /// Groups that ran more often than the frequency threshold allows.
    pub frequent_job_runs: FrequentJobRuns,
}

impl DetectionResult {
    /// True when neither rule flagged anything.
    pub fn is_empty(&self) -> bool {
        self.exceeded_duration.is_empty() && self.frequent_job_runs.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.exceeded_duration.len() + self.frequent_job_runs.len()
    }
}

/// Everything an analysis pass hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    /// When the pass evaluated its windows.
    pub analyzed_at: DateTime<Utc>,
    /// Number of runs fetched in the lookback window.
    pub runs_scanned: usize,
    #[serde(flatten)]
    pub detection: DetectionResult,
    /// Rendered text report.
    pub report: String,
}
