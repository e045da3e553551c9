//! Client for the local transcript service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvestError, Result};

pub const DEFAULT_SERVER_BASE: &str = "http://localhost:8787";
pub const DEFAULT_LANGS: &str = "ko,en";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

#[derive(Clone)]
pub struct TranscriptClient {
    client: reqwest::Client,
    base: String,
    langs: String,
    stt: bool,
}

impl TranscriptClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let base = base.into().trim().trim_end_matches('/').to_string();
        url::Url::parse(&base)
            .map_err(|e| HarvestError::configuration(format!("invalid server url {base}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            langs: DEFAULT_LANGS.to_string(),
            stt: false,
        })
    }

    /// Ask the service to fall back to speech-to-text when no captions exist.
    pub fn with_stt(mut self, stt: bool) -> Self {
        self.stt = stt;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn fetch(&self, video_url: &str) -> Result<TranscriptResponse> {
        let mut query = vec![("url", video_url), ("lang", self.langs.as_str())];
        if self.stt {
            query.push(("stt", "1"));
        }

        debug!(url = video_url, stt = self.stt, "transcript request");
        let response = self
            .client
            .get(format!("{}/transcript", self.base))
            .query(&query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::TranscriptHttp {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }
        Ok(response.json::<TranscriptResponse>().await?)
    }

    /// `Ok(())` when the service answers its health endpoint with 2xx.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::TranscriptHttp {
                status: status.as_u16(),
                reason: None,
            });
        }
        Ok(())
    }
}

fn error_reason(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match (parsed.error, parsed.detail) {
        (Some(error), Some(detail)) if !detail.is_empty() => Some(format!("{error}: {detail}")),
        (Some(error), _) => Some(error),
        (None, detail) => detail,
    }
}
