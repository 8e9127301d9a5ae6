//! Analysis pass orchestration.
//!
//! One pass fetches the lookback window, applies both rules to the same
//! snapshot and composes the text report. Any error aborts the pass; no
//! partial report is ever returned.

use crate::error::AnalysisError;
use crate::fetcher::{Fetcher, RunSource};
use crate::models::{AnalysisOutcome, DetectionResult, JobRun};
use crate::report;
use crate::rules;
use chrono::{DateTime, Duration, Utc};
use indicatif::ProgressBar;
use tracing::info;

/// Thresholds and windows for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Runs longer than this are flagged.
    pub duration_threshold: Duration,
    /// Groups with more recent runs than this are flagged.
    pub frequency_count_threshold: usize,
    /// How far back a run's end time may be to count as recent.
    pub frequency_timeframe: Duration,
    /// How far back to fetch run history.
    pub lookback_window: Duration,
    /// Runs requested per page.
    pub page_size: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            duration_threshold: Duration::hours(1),
            frequency_count_threshold: 10,
            frequency_timeframe: Duration::hours(1),
            lookback_window: Duration::weeks(2),
            page_size: 20,
        }
    }
}

/// Runs analysis passes against a run source.
pub struct Analyzer<S> {
    fetcher: Fetcher<S>,
    config: AnalysisConfig,
}

impl<S: RunSource> Analyzer<S> {
    pub fn new(source: S, config: AnalysisConfig) -> Self {
        let fetcher = Fetcher::new(source, config.page_size, config.lookback_window);
        Self { fetcher, config }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.fetcher = self.fetcher.with_progress(progress);
        self
    }

    /// Run a pass evaluated at the current time.
    pub async fn run(&self) -> Result<AnalysisOutcome, AnalysisError> {
        self.run_at(Utc::now()).await
    }

    /// Run a pass with both windows anchored at `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<AnalysisOutcome, AnalysisError> {
        let runs = self.fetcher.fetch_runs(now).await?;
        let detection = self.detect(&runs, now);

        info!(
            "Detected {} long-running runs and {} high-frequency groups in {} runs",
            detection.exceeded_duration.len(),
            detection.frequent_job_runs.len(),
            runs.len()
        );

        let report = report::compose(&detection.exceeded_duration, &detection.frequent_job_runs);

        Ok(AnalysisOutcome {
            analyzed_at: now,
            runs_scanned: runs.len(),
            detection,
            report,
        })
    }

    /// Apply both rules to an already fetched snapshot.
    pub fn detect(&self, runs: &[JobRun], now: DateTime<Utc>) -> DetectionResult {
        DetectionResult {
            exceeded_duration: rules::exceeding_duration(runs, self.config.duration_threshold),
            frequent_job_runs: rules::frequent_job_runs(
                runs,
                self.config.frequency_count_threshold,
                self.config.frequency_timeframe,
                now,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::tests::{raw_run, ScriptedSource};
    use crate::fetcher::RunsPage;
    use crate::models::GroupKey;

    const NOW_MS: i64 = 1_700_100_000_000;
    const MINUTE_MS: i64 = 60_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MS).unwrap()
    }

    /// 11 quick recent runs of job 7 by alice, plus one 90-minute run.
    fn scenario_pages() -> Vec<Result<RunsPage, FetchError>> {
        let mut runs: Vec<_> = (0..11)
            .map(|i| {
                let end = NOW_MS - (i + 1) * MINUTE_MS;
                raw_run(i, end - MINUTE_MS, Some(end))
            })
            .collect();
        let mut long = raw_run(100, NOW_MS - 200 * MINUTE_MS, Some(NOW_MS - 110 * MINUTE_MS));
        long.creator_user_name = Some("bob".to_string());
        runs.push(long);

        let second = runs.split_off(6);
        vec![
            Ok(RunsPage {
                runs,
                has_more: true,
                next_page_token: Some("p2".to_string()),
            }),
            Ok(RunsPage {
                runs: second,
                has_more: false,
                next_page_token: None,
            }),
        ]
    }

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.duration_threshold, Duration::hours(1));
        assert_eq!(config.frequency_count_threshold, 10);
        assert_eq!(config.frequency_timeframe, Duration::hours(1));
        assert_eq!(config.lookback_window, Duration::days(14));
        assert_eq!(config.page_size, 20);
    }

    #[tokio::test]
    async fn test_run_detects_both_anomalies() {
        let analyzer = Analyzer::new(ScriptedSource::new(scenario_pages()), AnalysisConfig::default());

        let outcome = analyzer.run_at(now()).await.unwrap();

        assert_eq!(outcome.runs_scanned, 12);
        assert_eq!(outcome.analyzed_at, now());
        assert_eq!(outcome.detection.exceeded_duration.len(), 1);
        assert_eq!(outcome.detection.exceeded_duration[0].run_id, "100");
        let group = outcome
            .detection
            .frequent_job_runs
            .get(&GroupKey::new("7", "alice"))
            .unwrap();
        assert_eq!(group.len(), 11);
        assert!(outcome.report.contains("Run ID: 100, Runtime: 1:30:00"));
        assert!(outcome.report.contains("Job ID: 7, User: alice"));
    }

    #[tokio::test]
    async fn test_run_is_idempotent_for_fixed_now() {
        let first = Analyzer::new(ScriptedSource::new(scenario_pages()), AnalysisConfig::default())
            .run_at(now())
            .await
            .unwrap();
        let second = Analyzer::new(ScriptedSource::new(scenario_pages()), AnalysisConfig::default())
            .run_at(now())
            .await
            .unwrap();

        assert_eq!(first.detection, second.detection);
        assert_eq!(
            serde_json::to_string(&first.detection).unwrap(),
            serde_json::to_string(&second.detection).unwrap()
        );
        assert_eq!(first.report, second.report);
    }

    #[tokio::test]
    async fn test_run_with_empty_window() {
        let analyzer = Analyzer::new(
            ScriptedSource::new(vec![Ok(RunsPage::default())]),
            AnalysisConfig::default(),
        );

        let outcome = analyzer.run_at(now()).await.unwrap();

        assert!(outcome.detection.is_empty());
        assert_eq!(outcome.runs_scanned, 0);
        assert_eq!(outcome.report.matches("No anomalies found.").count(), 2);
    }

    #[tokio::test]
    async fn test_run_fails_closed_on_fetch_error() {
        let mut pages = scenario_pages();
        pages[1] = Err(FetchError::Timeout { seconds: Some(30) });
        let analyzer = Analyzer::new(ScriptedSource::new(pages), AnalysisConfig::default());

        let err = analyzer.run_at(now()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Fetch(FetchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_custom_thresholds() {
        let config = AnalysisConfig {
            duration_threshold: Duration::hours(2),
            frequency_count_threshold: 11,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(ScriptedSource::new(scenario_pages()), config);

        let outcome = analyzer.run_at(now()).await.unwrap();
        assert!(outcome.detection.is_empty());
    }
}
