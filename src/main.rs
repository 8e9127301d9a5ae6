//! RunWatch - job-run anomaly detection
//!
//! A CLI tool that scans the recent run history of a Jobs API workspace,
//! flags runs that took too long and jobs run too often by the same owner,
//! and hands the resulting report to a notifier.
//!
//! Exit codes:
//!   0 - Success (report written, or no anomalies with --fail-on-anomalies)
//!   1 - The pass failed (connection, credentials, malformed data, config)
//!   2 - Anomalies found and --fail-on-anomalies set

mod analyzer;
mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod notify;
mod report;
mod rules;

use analyzer::{AnalysisConfig, Analyzer};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use error::AnalysisError;
use fetcher::{JobsClient, RunSource};
use indicatif::{ProgressBar, ProgressStyle};
use models::AnalysisOutcome;
use notify::{LogNotifier, Notification, Notifier, WebhookNotifier};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("RunWatch v{}", env!("CARGO_PKG_VERSION"));

    match run_watch(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .runwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize thresholds, output and recipients.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Resolve configuration, run one pass and route it to a notification.
/// Returns exit code (0 or 2).
async fn run_watch(args: Args) -> Result<i32> {
    let config = match resolve_config(&args, Path::new(".")) {
        Ok(config) => config,
        Err(e) => {
            // Notify whoever the command line names; the file is not trusted.
            let mut fallback = Config::default();
            fallback.merge_with_args(&args);
            if let Ok(Some(notifier)) = build_notifier(&args, &fallback) {
                notify_failure(notifier.as_ref(), &fallback, &e).await;
            }
            return Err(e);
        }
    };

    let notifier = build_notifier(&args, &config)?;

    let client = match JobsClient::new(
        &config.source.host,
        args.token.clone().unwrap_or_default(),
        config.source.timeout_seconds,
    ) {
        Ok(client) => client,
        Err(e) => {
            let e = anyhow::Error::from(e);
            if let Some(ref notifier) = notifier {
                notify_failure(notifier.as_ref(), &config, &e).await;
            }
            return Err(e);
        }
    };

    watch(client, &args, &config, notifier.as_deref()).await
}

/// Run one pass against `source` and hand the outcome to `notifier`.
///
/// A failed pass is returned as an error after the failure notification.
/// Delivery problems are logged and never change the result.
async fn watch<S: RunSource>(
    source: S,
    args: &Args,
    config: &Config,
    notifier: Option<&dyn Notifier>,
) -> Result<i32> {
    let result = execute_pass(source, args, config).await;

    if let Some(notifier) = notifier {
        match &result {
            Ok(outcome) => {
                let notification = Notification::success(
                    &config.report.title,
                    &config.notify.recipients,
                    &outcome.report,
                );
                deliver(notifier, notification).await;
            }
            Err(e) => notify_failure(notifier, config, e).await,
        }
    }

    if let Err(ref e) = result {
        if let Some(AnalysisError::Fetch(fetch_err)) = e.downcast_ref::<AnalysisError>() {
            info!(
                "Fetch failure is {}retryable",
                if fetch_err.is_retryable() { "" } else { "not " }
            );
        }
    }

    let outcome = result?;

    if args.fail_on_anomalies && !outcome.detection.is_empty() {
        eprintln!(
            "\n⛔ {} anomalies found. Failing (exit code 2).",
            outcome.detection.anomaly_count()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Fetch, detect, render and write the report.
async fn execute_pass<S: RunSource>(
    source: S,
    args: &Args,
    config: &Config,
) -> Result<AnalysisOutcome> {
    let analysis_config = AnalysisConfig::try_from(config)?;

    println!("📥 Fetching job runs from {}", config.source.host);
    println!(
        "   Lookback: {} days | Page size: {}",
        config.source.lookback_days, config.source.page_size
    );
    debug!("Analysis config: {:?}", analysis_config);

    let spinner = (!args.quiet).then(fetch_spinner);
    let mut analyzer = Analyzer::new(source, analysis_config);
    if let Some(ref pb) = spinner {
        analyzer = analyzer.with_progress(pb.clone());
    }

    let outcome = analyzer.run().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let outcome = outcome?;

    debug!("Report body:\n{}", outcome.report);

    let rendered = report::render(&outcome, config.report.format, &config.report.title)?;
    std::fs::write(&config.report.output, &rendered)
        .with_context(|| format!("Failed to write report to {}", config.report.output))?;

    println!("\n📊 Analysis Summary:");
    println!("   Runs scanned: {}", outcome.runs_scanned);
    println!(
        "   Long-running runs: {}",
        outcome.detection.exceeded_duration.len()
    );
    println!(
        "   High-frequency job/owner pairs: {}",
        outcome.detection.frequent_job_runs.len()
    );
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        config.report.output
    );

    Ok(outcome)
}

fn fetch_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Fetching job runs...");
    pb
}

/// Pick the notifier: none with --no-notify, webhook when configured, log otherwise.
fn build_notifier(args: &Args, config: &Config) -> Result<Option<Box<dyn Notifier>>> {
    if args.no_notify {
        return Ok(None);
    }

    let notifier: Box<dyn Notifier> = match config.notify.webhook_url {
        Some(ref url) => {
            info!("Notifications go to webhook {}", url);
            Box::new(WebhookNotifier::new(url.clone(), config.source.timeout_seconds)?)
        }
        None => Box::new(LogNotifier),
    };

    Ok(Some(notifier))
}

async fn notify_failure(notifier: &dyn Notifier, config: &Config, err: &anyhow::Error) {
    let notification = Notification::failure(
        &config.report.title,
        &config.notify.recipients,
        &format!("{:#}", err),
    );
    deliver(notifier, notification).await;
}

async fn deliver(notifier: &dyn Notifier, notification: Result<Notification>) {
    let notification = match notification {
        Ok(notification) => notification,
        Err(e) => {
            warn!("Failed to render notification: {:#}", e);
            return;
        }
    };

    if let Err(e) = notifier.send(&notification).await {
        warn!("Failed to deliver notification '{}': {:#}", notification.subject, e);
    }
}

/// Load, merge and validate the configuration for this pass.
fn resolve_config(args: &Args, dir: &Path) -> Result<Config> {
    let mut config = load_config(args, dir)?;
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

/// Load configuration from file or use defaults.
///
/// A config file that exists but cannot be read or parsed is an error.
fn load_config(args: &Args, dir: &Path) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(dir)? {
        Some(config) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
