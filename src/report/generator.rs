//! Anomaly report generation.
//!
//! The text report is the canonical rendering; HTML and JSON wrap the same
//! findings for notification bodies and machine consumers.

use crate::cli::OutputFormat;
use crate::models::{AnalysisOutcome, FrequentJobRuns, JobRun};
use super::templating;
use anyhow::{Context, Result};
use chrono::Duration;

const NO_ANOMALIES: &str = "No anomalies found.\n";

/// Compose the plain-text report from both rule outputs.
///
/// Duration findings keep their input order; frequency groups are listed by
/// key with their members in order.
pub fn compose(exceeded_duration: &[JobRun], frequent_job_runs: &FrequentJobRuns) -> String {
    let mut output = String::new();

    output.push_str(&generate_duration_section(exceeded_duration));
    output.push('\n');
    output.push_str(&generate_frequency_section(frequent_job_runs));

    output
}

/// Generate the long-running section.
fn generate_duration_section(runs: &[JobRun]) -> String {
    let mut section = String::from("Job Runs Exceeding Duration:\n");

    if runs.is_empty() {
        section.push_str(NO_ANOMALIES);
        return section;
    }

    for run in runs {
        section.push_str(&format!(
            "Run ID: {}, Runtime: {}\n",
            run.run_id,
            format_runtime(run.runtime())
        ));
    }

    section
}

/// Generate the high-frequency section.
fn generate_frequency_section(groups: &FrequentJobRuns) -> String {
    let mut section = String::from("Frequent Job Runs:\n");

    if groups.is_empty() {
        section.push_str(NO_ANOMALIES);
        return section;
    }

    for (key, runs) in groups.iter() {
        section.push_str(&format!(
            "Job ID: {}, User: {}\n",
            display_field(&key.job_id),
            display_field(&key.creator_user_name)
        ));

        for run in runs {
            section.push_str(&format!(
                "  Run ID: {}, Runtime: {}\n",
                run.run_id,
                format_runtime(run.runtime)
            ));
        }
        section.push('\n');
    }

    section
}

/// Empty identifiers print as `""` so they stay visible in the report.
fn display_field(value: &str) -> &str {
    if value.is_empty() {
        "\"\""
    } else {
        value
    }
}

/// Format a runtime as `H:MM:SS`. Hours are not wrapped at a day.
pub fn format_runtime(runtime: Duration) -> String {
    let total = runtime.num_seconds().max(0);
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Wrap a text report in a minimal HTML fragment suitable for mail bodies.
pub fn render_html(title: &str, report_text: &str) -> Result<String> {
    templating::render(templating::REPORT_HTML, title, report_text)
        .context("Failed to render HTML report")
}

/// Generate a JSON report.
pub fn generate_json_report(outcome: &AnalysisOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).map_err(Into::into)
}

/// Render an outcome in the requested format.
pub fn render(outcome: &AnalysisOutcome, format: OutputFormat, title: &str) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(outcome.report.clone()),
        OutputFormat::Html => render_html(title, &outcome.report),
        OutputFormat::Json => generate_json_report(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionResult, GroupKey};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn run(id: &str, job: &str, user: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> JobRun {
        JobRun {
            run_id: id.to_string(),
            job_id: job.to_string(),
            creator_user_name: user.to_string(),
            start_time: start,
            end_time: Some(end),
        }
    }

    fn create_test_outcome() -> AnalysisOutcome {
        let long = run("101", "J9", "bob", at(9, 0), at(11, 30));
        let frequent = run("202", "J1", "alice", at(11, 0), at(11, 2));
        let frequent_job_runs: FrequentJobRuns =
            [(frequent.group_key(), vec![frequent.summary()])].into_iter().collect();
        let detection = DetectionResult {
            exceeded_duration: vec![long],
            frequent_job_runs,
        };
        let report = compose(&detection.exceeded_duration, &detection.frequent_job_runs);

        AnalysisOutcome {
            analyzed_at: at(12, 0),
            runs_scanned: 2,
            detection,
            report,
        }
    }

    #[test]
    fn test_compose_lists_both_sections() {
        let outcome = create_test_outcome();
        let expected = "Job Runs Exceeding Duration:\n\
                        Run ID: 101, Runtime: 2:30:00\n\
                        \n\
                        Frequent Job Runs:\n\
                        Job ID: J1, User: alice\n  \
                        Run ID: 202, Runtime: 0:02:00\n\
                        \n";
        assert_eq!(outcome.report, expected);
    }

    #[test]
    fn test_compose_empty_states_no_anomalies() {
        let report = compose(&[], &FrequentJobRuns::default());

        assert_eq!(report.matches("No anomalies found.").count(), 2);
        assert!(report.starts_with("Job Runs Exceeding Duration:\n"));
        assert!(report.contains("Frequent Job Runs:\n"));
    }

    #[test]
    fn test_compose_groups_in_key_order() {
        let a = run("1", "J2", "zed", at(11, 0), at(11, 1));
        let b = run("2", "J1", "amy", at(11, 0), at(11, 1));
        let groups: FrequentJobRuns = [
            (GroupKey::new("J2", "zed"), vec![a.summary()]),
            (GroupKey::new("J1", "amy"), vec![b.summary()]),
        ]
        .into_iter()
        .collect();

        let report = compose(&[], &groups);
        let j1 = report.find("Job ID: J1").unwrap();
        let j2 = report.find("Job ID: J2").unwrap();
        assert!(j1 < j2);
    }

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(Duration::zero()), "0:00:00");
        assert_eq!(format_runtime(Duration::seconds(3725)), "1:02:05");
        assert_eq!(format_runtime(Duration::hours(26)), "26:00:00");
    }

    #[test]
    fn test_render_html_escapes() {
        let html = render_html("Runs <daily>", "Job ID: a&b, User: <x>\n").unwrap();
        assert!(html.contains("<p>Runs &lt;daily&gt;</p>"));
        assert!(html.contains("<pre>Job ID: a&amp;b, User: &lt;x&gt;\n</pre>"));
    }

    #[test]
    fn test_render_html_format() {
        let outcome = create_test_outcome();
        let html = render(&outcome, OutputFormat::Html, "RUNWATCH").unwrap();
        assert!(html.starts_with("<p>RUNWATCH</p>\n<pre>Job Runs Exceeding Duration:\n"));
    }

    #[test]
    fn test_compose_shows_empty_owner_distinctly() {
        let anonymous = run("1", "J1", "", at(11, 0), at(11, 1));
        let named = run("2", "J1", "(unknown)", at(11, 0), at(11, 1));
        let groups: FrequentJobRuns = [
            (anonymous.group_key(), vec![anonymous.summary()]),
            (named.group_key(), vec![named.summary()]),
        ]
        .into_iter()
        .collect();

        let report = compose(&[], &groups);
        assert!(report.contains("Job ID: J1, User: \"\"\n"));
        assert!(report.contains("Job ID: J1, User: (unknown)\n"));
    }

    #[test]
    fn test_generate_json_report() {
        let outcome = create_test_outcome();
        let json = generate_json_report(&outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["runs_scanned"], 2);
        assert_eq!(value["exceeded_duration"][0]["run_id"], "101");
        assert_eq!(value["frequent_job_runs"][0]["job_id"], "J1");
        assert!(value["report"].as_str().unwrap().contains("Frequent Job Runs:"));
    }

    #[test]
    fn test_render_text_is_report() {
        let outcome = create_test_outcome();
        let text = render(&outcome, OutputFormat::Text, "RUNWATCH").unwrap();
        assert_eq!(text, outcome.report);
    }
}
