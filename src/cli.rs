//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset here fall back to the
//! configuration file, then to built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// RunWatch - flags long-running and high-frequency job runs
///
/// Scans the recent run history of a Jobs API workspace, reports runs that
/// took too long and job/owner pairs that ran too often, and hands the
/// report to a notifier.
///
/// Examples:
///   runwatch --host https://adb-123.azuredatabricks.net
///   runwatch --duration-threshold-mins 30 --format html -o report.html
///   runwatch --frequency-threshold 5 --frequency-timeframe-mins 15 --fail-on-anomalies
///   runwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Jobs API workspace URL
    ///
    /// Can also be set via DATABRICKS_HOST or `[source] host` in .runwatch.toml.
    #[arg(long, value_name = "URL", env = "DATABRICKS_HOST")]
    pub host: Option<String>,

    /// Personal access token for the Jobs API
    #[arg(long, value_name = "TOKEN", env = "DATABRICKS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .runwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, html, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Flag runs that take longer than this many minutes
    #[arg(long, value_name = "MINS")]
    pub duration_threshold_mins: Option<u64>,

    /// Flag job/owner pairs with more recent runs than this
    #[arg(long, value_name = "COUNT")]
    pub frequency_threshold: Option<usize>,

    /// Window, in minutes, in which completed runs count as recent
    #[arg(long, value_name = "MINS")]
    pub frequency_timeframe_mins: Option<u64>,

    /// How many days of run history to fetch
    #[arg(long, value_name = "DAYS")]
    pub lookback_days: Option<u64>,

    /// Runs requested per API page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Title used in the report and notification subject
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Notification recipients (comma-separated)
    #[arg(long, value_name = "EMAILS", value_delimiter = ',')]
    pub recipients: Option<Vec<String>>,

    /// Webhook that receives the notification as JSON
    #[arg(long, value_name = "URL", env = "RUNWATCH_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Do not send any notification
    #[arg(long)]
    pub no_notify: bool,

    /// Exit with code 2 when any anomaly is found
    ///
    /// Useful when a scheduler should route the pass to a failure path.
    #[arg(long)]
    pub fail_on_anomalies: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .runwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// HTML fragment, as used for mail bodies
    Html,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref host) = self.host {
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err("Host must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.token.as_deref().map_or(true, str::is_empty) {
            return Err("An API token is required (--token or DATABRICKS_TOKEN)".to_string());
        }

        if let Some(ref url) = self.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Webhook URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.duration_threshold_mins == Some(0) {
            return Err("Duration threshold must be at least 1 minute".to_string());
        }

        if self.frequency_timeframe_mins == Some(0) {
            return Err("Frequency timeframe must be at least 1 minute".to_string());
        }

        if self.lookback_days == Some(0) {
            return Err("Lookback must be at least 1 day".to_string());
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            host: Some("https://adb-123.azuredatabricks.net".to_string()),
            token: Some("dapi-test".to_string()),
            config: None,
            output: None,
            format: None,
            duration_threshold_mins: None,
            frequency_threshold: None,
            frequency_timeframe_mins: None,
            lookback_days: None,
            page_size: None,
            timeout: None,
            title: None,
            recipients: None,
            webhook_url: None,
            no_notify: false,
            fail_on_anomalies: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_host() {
        let mut args = make_args();
        args.host = Some("adb-123.azuredatabricks.net".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_token() {
        let mut args = make_args();
        args.token = None;
        assert!(args.validate().is_err());

        args.token = Some(String::new());
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut args = make_args();
        args.page_size = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.duration_threshold_mins = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.lookback_days = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_zero_frequency_threshold_is_allowed() {
        let mut args = make_args();
        args.frequency_threshold = Some(0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_recipients_and_format() {
        let args = Args::try_parse_from([
            "runwatch",
            "--token",
            "t",
            "--recipients",
            "a@example.com,b@example.com",
            "--format",
            "html",
        ])
        .unwrap();
        assert_eq!(
            args.recipients,
            Some(vec!["a@example.com".to_string(), "b@example.com".to_string()])
        );
        assert_eq!(args.format, Some(OutputFormat::Html));
    }
}
