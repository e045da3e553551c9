use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::{
    error::{HarvestError, Result},
    retry::{RetryPolicy, pause},
    types::ResolvedChannel,
    youtube::YoutubeApi,
};

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{20,}$").expect("valid channel id regex"));
static CHANNEL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/channel/(UC[0-9A-Za-z_-]+)").expect("valid channel path regex"));
static HANDLE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/@([^/]+)").expect("valid handle path regex"));

/// What a free-form channel reference turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    ChannelId(String),
    Handle(String),
    Custom(String),
    Search(String),
}

impl ChannelInput {
    /// Classify `raw`, preferring the most specific interpretation. `None`
    /// for blank input and for handles or `/c/`, `/user/` links with no name.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = decode(raw.trim());
        if s.is_empty() {
            return None;
        }
        if CHANNEL_ID.is_match(&s) {
            return Some(ChannelInput::ChannelId(s));
        }
        if let Some(handle) = s.strip_prefix('@') {
            return non_empty(decode(handle)).map(ChannelInput::Handle);
        }
        if let Some(parsed) = parse_youtube_url(&s) {
            return parsed;
        }
        Some(ChannelInput::Search(s))
    }

    pub fn value(&self) -> &str {
        match self {
            ChannelInput::ChannelId(v)
            | ChannelInput::Handle(v)
            | ChannelInput::Custom(v)
            | ChannelInput::Search(v) => v,
        }
    }

    /// Search queries to try in order for inputs that need a search call.
    fn query_variants(&self) -> Vec<String> {
        match self {
            ChannelInput::Handle(h) => vec![format!("@{h}"), h.clone()],
            other => vec![other.value().to_string()],
        }
    }
}

/// `None` when `s` is not a channel link; `Some(None)` when it is one that
/// names no channel.
fn parse_youtube_url(s: &str) -> Option<Option<ChannelInput>> {
    let url = Url::parse(s).ok()?;
    let host = url.host_str()?;
    if !host.contains("youtube.com") && !host.contains("youtu.be") {
        return None;
    }
    let path = url.path();
    if let Some(caps) = CHANNEL_PATH.captures(path) {
        return Some(Some(ChannelInput::ChannelId(caps[1].to_string())));
    }
    if let Some(caps) = HANDLE_PATH.captures(path) {
        return Some(non_empty(decode(&caps[1])).map(ChannelInput::Handle));
    }
    let mut segments = path.split('/').filter(|p| !p.is_empty());
    match segments.next() {
        Some("user" | "c") => Some(
            non_empty(decode(segments.next().unwrap_or_default())).map(ChannelInput::Custom),
        ),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Resolve one channel reference to its id and title.
///
/// Explicit ids are checked with a single lookup. Everything else goes
/// through channel search, walking result pages until a channel shows up.
pub async fn resolve_channel(api: &YoutubeApi, raw: &str) -> Result<ResolvedChannel> {
    resolve_channel_with(api, raw, &RetryPolicy::channel_search()).await
}

pub(crate) async fn resolve_channel_with(
    api: &YoutubeApi,
    raw: &str,
    policy: &RetryPolicy,
) -> Result<ResolvedChannel> {
    let input = ChannelInput::parse(raw)
        .ok_or_else(|| HarvestError::resolution(raw, "no channel name in input"))?;

    if let ChannelInput::ChannelId(id) = &input {
        return api
            .channel_by_id(id)
            .await?
            .ok_or_else(|| HarvestError::resolution(raw, "channel not found"));
    }

    for query in input.query_variants() {
        let mut page_token: Option<String> = None;
        let mut attempt = 0;
        while policy.allows_attempt(attempt) {
            attempt += 1;
            match api.search_channels(&query, page_token.as_deref()).await {
                Ok(page) => {
                    if let Some(channel) = page.items.into_iter().next() {
                        return Ok(channel);
                    }
                    match page.next_page_token {
                        Some(next) => page_token = Some(next),
                        None => break,
                    }
                }
                Err(e) if (policy.retryable)(&e) => {
                    warn!(query = %query, attempt, error = %e, "channel search failed, retrying");
                    policy.backoff().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Err(HarvestError::resolution(raw, "no matching channel"))
}

/// Resolve several references one after another. Individual failures are
/// logged and skipped; the call fails only when nothing resolved.
pub async fn resolve_channels<S: AsRef<str>>(
    api: &YoutubeApi,
    inputs: &[S],
) -> Result<Vec<ResolvedChannel>> {
    resolve_channels_with(
        api,
        inputs,
        &RetryPolicy::channel_search(),
        Duration::from_millis(200),
    )
    .await
}

pub(crate) async fn resolve_channels_with<S: AsRef<str>>(
    api: &YoutubeApi,
    inputs: &[S],
    policy: &RetryPolicy,
    courtesy: Duration,
) -> Result<Vec<ResolvedChannel>> {
    let targets: Vec<&str> = inputs
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(HarvestError::resolution("", "no channel inputs given"));
    }

    let mut resolved = Vec::new();
    for (i, raw) in targets.iter().enumerate() {
        match resolve_channel_with(api, raw, policy).await {
            Ok(channel) => {
                info!(channel = %channel.title, id = %channel.id, "[resolve] channel");
                resolved.push(channel);
            }
            Err(e @ HarvestError::Configuration { .. }) => return Err(e),
            Err(e) => warn!(input = %raw, error = %e, "[resolve] failed"),
        }
        if i + 1 < targets.len() {
            pause(courtesy, courtesy).await;
        }
    }

    if resolved.is_empty() {
        return Err(HarvestError::resolution(
            targets.join(", "),
            "none of the channels could be resolved",
        ));
    }
    Ok(resolved)
}
