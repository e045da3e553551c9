use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Invalid concurrency {value}: must be between {min} and {max}")]
    InvalidConcurrency { value: usize, min: usize, max: usize },

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("Could not resolve {input}: {reason}")]
    Resolution { input: String, reason: String },

    #[error("YouTube API {endpoint} returned HTTP {status}")]
    ApiStatus { endpoint: &'static str, status: u16 },

    #[error("Transcript http {status}{}", reason_suffix(.reason))]
    TranscriptHttp { status: u16, reason: Option<String> },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Aborted")]
    Aborted,
}

impl HarvestError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        HarvestError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn resolution(input: impl Into<String>, reason: impl Into<String>) -> Self {
        HarvestError::Resolution {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Network-level failures that are worth another attempt after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HarvestError::ApiStatus { .. }
                | HarvestError::TranscriptHttp { .. }
                | HarvestError::Http(_)
        )
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(" {r}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// Why a single batch item settled as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Worker(String),
}
