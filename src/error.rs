//! Error types for an analysis pass.
//!
//! Every error aborts the pass as a whole. Retrying is left to whatever
//! scheduled the pass; [`FetchError::is_retryable`] is there to help it decide.

use thiserror::Error;

/// Failure talking to the job-run source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete in time. `seconds` is the client
    /// timeout when known.
    #[error("request timed out{}", timeout_suffix(.seconds))]
    Timeout { seconds: Option<u64> },

    /// The API host could not be reached.
    #[error("cannot connect to jobs API: {0}")]
    Connect(String),

    /// Any other transport-level failure.
    #[error("request failed: {0}")]
    Http(String),

    /// The token was rejected.
    #[error("jobs API rejected credentials ({status})")]
    Unauthorized { status: u16 },

    /// Non-success status from the API.
    #[error("jobs API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body was not a valid runs page.
    #[error("failed to decode runs page: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connect(_) | FetchError::Http(_) => true,
            FetchError::Api { status, .. } => *status == 429 || *status >= 500,
            FetchError::Unauthorized { .. } | FetchError::Decode(_) => false,
        }
    }
}

fn timeout_suffix(seconds: &Option<u64>) -> String {
    match seconds {
        Some(secs) => format!(" after {}s", secs),
        None => String::new(),
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { seconds: None }
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// Failure of a whole analysis pass.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to fetch job runs: {0}")]
    Fetch(#[from] FetchError),

    /// A run record broke the data contract (e.g. no start time).
    #[error("malformed job run {run_id}: {reason}")]
    ContractViolation { run_id: String, reason: String },

    /// The lookback window reaches before the earliest representable time.
    #[error("lookback window of {} days is out of range", .lookback.num_days())]
    WindowOutOfRange { lookback: chrono::Duration },
}

impl AnalysisError {
    pub fn contract(run_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::ContractViolation {
            run_id: run_id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "jobs API error 503: unavailable");

        let err = AnalysisError::contract("42", "missing start_time");
        assert_eq!(err.to_string(), "malformed job run 42: missing start_time");
    }

    #[test]
    fn test_timeout_display_without_known_limit() {
        assert_eq!(
            FetchError::Timeout { seconds: Some(30) }.to_string(),
            "request timed out after 30s"
        );
        assert_eq!(FetchError::Timeout { seconds: None }.to_string(), "request timed out");
    }

    #[test]
    fn test_is_retryable() {
        assert!(FetchError::Timeout { seconds: Some(30) }.is_retryable());
        assert!(FetchError::Timeout { seconds: None }.is_retryable());
        assert!(FetchError::Connect("refused".to_string()).is_retryable());
        assert!(FetchError::Api {
            status: 429,
            body: String::new()
        }
        .is_retryable());

        assert!(!FetchError::Unauthorized { status: 403 }.is_retryable());
        assert!(!FetchError::Api {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!FetchError::Decode("bad json".to_string()).is_retryable());
    }

    #[test]
    fn test_fetch_error_converts_into_analysis_error() {
        let err: AnalysisError = FetchError::Http("reset".to_string()).into();
        assert!(matches!(err, AnalysisError::Fetch(FetchError::Http(_))));
    }
}
