//! Notification hand-off.
//!
//! A pass ends with exactly one notification: the report on success, the
//! error on failure. Delivery is the notifier's business; a failed delivery
//! is logged and never changes the outcome of the pass.

use crate::report::render_html;
use crate::report::templating::{self, FAILURE_SUBJECT, SUCCESS_SUBJECT};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// A message ready for a notification sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub recipients: Vec<String>,
    pub html_body: String,
}

impl Notification {
    /// Notification carrying a finished report.
    pub fn success(title: &str, recipients: &[String], report_text: &str) -> Result<Self> {
        Self::build(SUCCESS_SUBJECT, title, recipients, report_text)
    }

    /// Notification for a pass that aborted.
    pub fn failure(title: &str, recipients: &[String], error: &str) -> Result<Self> {
        Self::build(FAILURE_SUBJECT, title, recipients, error)
    }

    fn build(subject: &str, title: &str, recipients: &[String], body: &str) -> Result<Self> {
        Ok(Self {
            subject: templating::render(subject, title, "")
                .context("Failed to render notification subject")?,
            recipients: recipients.to_vec(),
            html_body: render_html(title, body)?,
        })
    }
}

/// Delivers notifications somewhere.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Emits notifications through the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            "Notification '{}' for {} recipient(s)",
            notification.subject,
            notification.recipients.len()
        );
        debug!("Notification body:\n{}", notification.html_body);
        Ok(())
    }
}

/// POSTs notifications as JSON to a webhook (e.g. a mail relay).
pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("Failed to reach notification webhook {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Webhook error {}: {}", status, body));
        }

        info!("Notification '{}' delivered to webhook", notification.subject);
        Ok(())
    }
}
