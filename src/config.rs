//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.runwatch.toml` files. Credentials are never read from the file.

use crate::analyzer::AnalysisConfig;
use crate::cli::{Args, OutputFormat};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".runwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Job-run source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Detection rule settings.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Where runs are fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Workspace URL. Usually supplied through DATABRICKS_HOST instead.
    #[serde(default)]
    pub host: String,

    /// Runs requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Days of history to fetch.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            page_size: default_page_size(),
            lookback_days: default_lookback_days(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_lookback_days() -> u64 {
    14
}

fn default_timeout() -> u64 {
    60
}

/// Thresholds for the two detection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Runs longer than this are flagged.
    #[serde(default = "default_duration_threshold")]
    pub duration_threshold_minutes: u64,

    /// Job/owner pairs with more recent runs than this are flagged.
    #[serde(default = "default_frequency_count")]
    pub frequency_count_threshold: usize,

    /// Trailing window for counting recent runs.
    #[serde(default = "default_frequency_timeframe")]
    pub frequency_timeframe_minutes: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            duration_threshold_minutes: default_duration_threshold(),
            frequency_count_threshold: default_frequency_count(),
            frequency_timeframe_minutes: default_frequency_timeframe(),
        }
    }
}

fn default_duration_threshold() -> u64 {
    60
}

fn default_frequency_count() -> usize {
    10
}

fn default_frequency_timeframe() -> u64 {
    60
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Title used in the report and notification subject.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            title: default_title(),
        }
    }
}

fn default_output() -> String {
    "runwatch_report.txt".to_string()
}

fn default_title() -> String {
    "HIGH_FREQUENCY_JOBS".to_string()
}

/// Notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Who receives the report.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Webhook receiving notifications as JSON. Log only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.runwatch.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or through their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref host) = args.host {
            self.source.host = host.clone();
        }
        if let Some(page_size) = args.page_size {
            self.source.page_size = page_size;
        }
        if let Some(days) = args.lookback_days {
            self.source.lookback_days = days;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(mins) = args.duration_threshold_mins {
            self.rules.duration_threshold_minutes = mins;
        }
        if let Some(count) = args.frequency_threshold {
            self.rules.frequency_count_threshold = count;
        }
        if let Some(mins) = args.frequency_timeframe_mins {
            self.rules.frequency_timeframe_minutes = mins;
        }

        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref title) = args.title {
            self.report.title = title.clone();
        }

        if let Some(ref recipients) = args.recipients {
            self.notify.recipients = recipients.clone();
        }
        if let Some(ref url) = args.webhook_url {
            self.notify.webhook_url = Some(url.clone());
        }
    }

    /// Check the merged configuration before a pass uses it.
    ///
    /// Runs after `merge_with_args`, so values from the file and from the
    /// command line are held to the same rules.
    pub fn validate(&self) -> Result<()> {
        let host = &self.source.host;
        if host.is_empty() {
            anyhow::bail!("No Jobs API host configured (--host, DATABRICKS_HOST or [source] host)");
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            anyhow::bail!("Host must start with 'http://' or 'https://': {}", host);
        }

        if self.source.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        if self.source.lookback_days == 0 {
            anyhow::bail!("lookback_days must be at least 1");
        }
        if self.source.timeout_seconds == 0 {
            anyhow::bail!("timeout_seconds must be at least 1");
        }
        if self.rules.duration_threshold_minutes == 0 {
            anyhow::bail!("duration_threshold_minutes must be at least 1");
        }
        if self.rules.frequency_timeframe_minutes == 0 {
            anyhow::bail!("frequency_timeframe_minutes must be at least 1");
        }

        if let Some(ref url) = self.notify.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("webhook_url must start with 'http://' or 'https://': {}", url);
            }
        }

        AnalysisConfig::try_from(self)?;
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

impl TryFrom<&Config> for AnalysisConfig {
    type Error = anyhow::Error;

    fn try_from(config: &Config) -> Result<Self> {
        Ok(Self {
            duration_threshold: minutes(
                "duration_threshold_minutes",
                config.rules.duration_threshold_minutes,
            )?,
            frequency_count_threshold: config.rules.frequency_count_threshold,
            frequency_timeframe: minutes(
                "frequency_timeframe_minutes",
                config.rules.frequency_timeframe_minutes,
            )?,
            lookback_window: i64::try_from(config.source.lookback_days)
                .ok()
                .and_then(Duration::try_days)
                .with_context(|| {
                    format!("lookback_days = {} is out of range", config.source.lookback_days)
                })?,
            page_size: config.source.page_size,
        })
    }
}

fn minutes(field: &str, value: u64) -> Result<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_minutes)
        .with_context(|| format!("{} = {} is out of range", field, value))
}
