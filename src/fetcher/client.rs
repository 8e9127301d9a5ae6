//! HTTP client for the Jobs API `runs/list` endpoint.

use super::{RunSource, RunsPage, RunsQuery};
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const RUNS_LIST_PATH: &str = "/api/2.1/jobs/runs/list";

/// Jobs API client authenticated with a bearer token.
pub struct JobsClient {
    http_client: reqwest::Client,
    host: String,
    token: String,
    timeout_seconds: u64,
}

impl JobsClient {
    /// Build a client for `host` (e.g. `https://adb-123.azuredatabricks.net`).
    pub fn new(
        host: impl Into<String>,
        token: impl Into<String>,
        timeout_seconds: u64,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("runwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout_seconds,
        })
    }

    /// Map a transport error from sending the request or reading its body.
    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                seconds: Some(self.timeout_seconds),
            }
        } else if err.is_connect() {
            FetchError::Connect(format!("{} ({})", self.host, err))
        } else {
            FetchError::from(err)
        }
    }
}

#[async_trait]
impl RunSource for JobsClient {
    async fn list_runs(&self, query: &RunsQuery) -> Result<RunsPage, FetchError> {
        let url = format!("{}{}", self.host, RUNS_LIST_PATH);

        let mut params = vec![
            ("limit", query.limit.to_string()),
            (
                "start_time_from",
                query.start_time_from.timestamp_millis().to_string(),
            ),
        ];
        if let Some(ref token) = query.page_token {
            params.push(("page_token", token.clone()));
        }

        debug!("GET {} (page_token={:?})", url, query.page_token);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<RunsPage>()
            .await
            .map_err(|e| self.map_send_error(e))
    }
}
