//! Run fetching.
//!
//! Pages through a [`RunSource`] and collects every run that started inside
//! the lookback window.

pub mod client;

pub use client::JobsClient;

use crate::error::{AnalysisError, FetchError};
use crate::models::JobRun;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use indicatif::ProgressBar;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// Identifier as the API sends it: numeric in practice, string tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Str(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Int(id) => write!(f, "{}", id),
            RawId::Str(id) => write!(f, "{}", id),
        }
    }
}

/// A run exactly as it appears in a runs page. Timestamps are epoch millis.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRun {
    pub run_id: RawId,
    #[serde(default)]
    pub job_id: Option<RawId>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    /// `0` or absent while the run has not finished.
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl TryFrom<RawRun> for JobRun {
    type Error = AnalysisError;

    fn try_from(raw: RawRun) -> Result<Self, Self::Error> {
        let run_id = raw.run_id.to_string();

        let start_time = match raw.start_time {
            Some(ms) if ms > 0 => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| AnalysisError::contract(&run_id, "start_time out of range"))?,
            _ => return Err(AnalysisError::contract(&run_id, "missing start_time")),
        };

        let end_time = match raw.end_time {
            Some(ms) if ms > 0 => Some(
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| AnalysisError::contract(&run_id, "end_time out of range"))?,
            ),
            _ => None,
        };

        if let Some(end) = end_time {
            if end < start_time {
                return Err(AnalysisError::contract(&run_id, "end_time precedes start_time"));
            }
        }

        Ok(JobRun {
            run_id,
            job_id: raw.job_id.map(|id| id.to_string()).unwrap_or_default(),
            creator_user_name: raw.creator_user_name.unwrap_or_default(),
            start_time,
            end_time,
        })
    }
}

/// Parameters for a single `list_runs` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunsQuery {
    pub limit: u32,
    pub start_time_from: DateTime<Utc>,
    pub page_token: Option<String>,
}

/// One page of the runs listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunsPage {
    #[serde(default)]
    pub runs: Vec<RawRun>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl RunsPage {
    /// Token for the next page, if the listing continues.
    pub fn continuation(&self) -> Option<&str> {
        if self.has_more {
            self.next_page_token.as_deref().filter(|t| !t.is_empty())
        } else {
            None
        }
    }
}

/// Read-only source of job runs.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn list_runs(&self, query: &RunsQuery) -> Result<RunsPage, FetchError>;
}

/// Collects the full lookback window from a [`RunSource`].
pub struct Fetcher<S> {
    source: S,
    page_size: u32,
    lookback_window: Duration,
    progress: Option<ProgressBar>,
}

impl<S: RunSource> Fetcher<S> {
    pub fn new(source: S, page_size: u32, lookback_window: Duration) -> Self {
        Self {
            source,
            page_size,
            lookback_window,
            progress: None,
        }
    }

    /// Report page progress on the given bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fetch all runs that started within the lookback window ending at `now`.
    ///
    /// Every page request carries the same `start_time_from`, so runs that
    /// arrive while paging still fall inside the filter.
    pub async fn fetch_runs(&self, now: DateTime<Utc>) -> Result<Vec<JobRun>, AnalysisError> {
        let start_time_from = now
            .checked_sub_signed(self.lookback_window)
            .ok_or(AnalysisError::WindowOutOfRange {
                lookback: self.lookback_window,
            })?;
        info!("Fetching job runs started since {}", start_time_from);

        let mut runs = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let query = RunsQuery {
                limit: self.page_size,
                start_time_from,
                page_token: page_token.take(),
            };

            let page = self.source.list_runs(&query).await?;
            pages += 1;
            debug!(
                "Page {}: {} runs, has_more={}",
                pages,
                page.runs.len(),
                page.has_more
            );

            let next = page.continuation().map(str::to_string);

            for raw in page.runs {
                runs.push(JobRun::try_from(raw)?);
            }

            if let Some(ref pb) = self.progress {
                pb.set_message(format!("Fetched {} runs ({} pages)", runs.len(), pages));
            }

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!("Fetched {} runs across {} pages", runs.len(), pages);
        Ok(runs)
    }
}
