//! Thin client for the parts of the YouTube Data API v3 the harvester needs.
//!
//! Every request takes the next key from the shared [`KeyPool`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    error::{HarvestError, Result},
    keys::KeyPool,
    resolve::DateRange,
    types::{Comment, ResolvedChannel, WorkItem, watch_url},
};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page the search and videos endpoints accept.
pub const MAX_PAGE_SIZE: usize = 50;

/// A stalled call surfaces as a transient `Http` error and is retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const KEY_CHECK_VIDEO_ID: &str = "dQw4w9WgXcQ";

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct YoutubeApi {
    client: reqwest::Client,
    base: String,
    keys: Arc<KeyPool>,
    request_timeout: Duration,
}

impl YoutubeApi {
    pub fn new(keys: Arc<KeyPool>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: DEFAULT_API_BASE.to_string(),
            keys,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let key = self.keys.next()?;
        self.get_json_with_key(endpoint, params, &key).await
    }

    async fn get_json_with_key<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
        key: &str,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base, endpoint);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .chain(std::iter::once(("key", key)))
            .collect();

        debug!(endpoint, "youtube api request");
        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::ApiStatus {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Look a channel up by its `UC…` id. `None` when the id does not exist.
    pub async fn channel_by_id(&self, channel_id: &str) -> Result<Option<ResolvedChannel>> {
        let response: ListResponse<ChannelItem> = self
            .get_json(
                "channels",
                &[("part", "snippet".into()), ("id", channel_id.into())],
            )
            .await?;

        Ok(response.items.into_iter().next().map(|item| ResolvedChannel {
            id: channel_id.to_string(),
            title: item.snippet.map(|s| s.title).unwrap_or_default(),
        }))
    }

    /// One page of channel-typed search results for `query`.
    pub async fn search_channels(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<Page<ResolvedChannel>> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("part", "snippet".into()),
                    ("q", query.into()),
                    ("type", "channel".into()),
                    ("maxResults", "5".into()),
                    ("pageToken", page_token.unwrap_or_default().into()),
                ],
            )
            .await?;

        let items = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.channel_id?;
                Some(ResolvedChannel {
                    id,
                    title: item.snippet.map(|s| s.title).unwrap_or_default(),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// One page of a channel's uploads, newest first, within `range`.
    pub async fn search_channel_videos(
        &self,
        channel_id: &str,
        range: &DateRange,
        page_token: Option<&str>,
    ) -> Result<Page<WorkItem>> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("part", "snippet".into()),
                    ("channelId", channel_id.into()),
                    ("type", "video".into()),
                    ("order", "date".into()),
                    ("maxResults", MAX_PAGE_SIZE.to_string()),
                    ("pageToken", page_token.unwrap_or_default().into()),
                    ("publishedAfter", range.published_after().unwrap_or_default()),
                    ("publishedBefore", range.published_before().unwrap_or_default()),
                ],
            )
            .await?;

        let items = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let snippet = item.snippet.unwrap_or_default();
                Some(WorkItem {
                    url: watch_url(&id),
                    id,
                    title: snippet.title,
                    published_at: snippet.published_at,
                    views: None,
                    channel_id: None,
                    channel_title: None,
                })
            })
            .collect();

        Ok(Page {
            items,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// View counts for up to [`MAX_PAGE_SIZE`] ids, keyed by video id.
    pub async fn view_counts(&self, ids: &[String]) -> Result<HashMap<String, u64>> {
        let response: ListResponse<VideoItem> = self
            .get_json(
                "videos",
                &[("part", "statistics".into()), ("id", ids.join(","))],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| (item.id, item.statistics.map(|s| s.views()).unwrap_or(0)))
            .collect())
    }

    /// Title, publish date, channel and views for up to [`MAX_PAGE_SIZE`] ids.
    pub async fn video_details(&self, ids: &[String]) -> Result<Vec<WorkItem>> {
        let response: ListResponse<VideoItem> = self
            .get_json(
                "videos",
                &[("part", "snippet,statistics".into()), ("id", ids.join(","))],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| {
                let snippet = item.snippet.unwrap_or_default();
                WorkItem {
                    url: watch_url(&item.id),
                    title: snippet.title,
                    published_at: snippet.published_at,
                    views: item.statistics.map(|s| s.views()),
                    channel_id: Some(snippet.channel_id).filter(|c| !c.is_empty()),
                    channel_title: Some(snippet.channel_title).filter(|c| !c.is_empty()),
                    id: item.id,
                }
            })
            .collect())
    }

    /// Top-level comments ranked by [`Comment::score`], at most `limit`.
    pub async fn top_comments(&self, video_id: &str, limit: usize) -> Result<Vec<Comment>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let response: ListResponse<CommentThreadItem> = self
            .get_json(
                "commentThreads",
                &[
                    ("part", "snippet".into()),
                    ("videoId", video_id.into()),
                    ("order", "relevance".into()),
                    ("textFormat", "plainText".into()),
                    ("maxResults", limit.min(100).to_string()),
                ],
            )
            .await?;

        let mut comments: Vec<Comment> = response
            .items
            .into_iter()
            .map(|thread| {
                let top = thread.snippet.top_level_comment.snippet;
                Comment {
                    author: top.author_display_name,
                    text: top.text_original,
                    like_count: top.like_count,
                    reply_count: thread.snippet.total_reply_count,
                    published_at: top.published_at,
                }
            })
            .collect();
        comments.sort_by(|a, b| b.score().cmp(&a.score()));
        comments.truncate(limit);
        Ok(comments)
    }

    /// Check a single key with a cheap statistics lookup.
    pub async fn test_key(&self, key: &str) -> Result<()> {
        let _: ListResponse<VideoItem> = self
            .get_json_with_key(
                "videos",
                &[("part", "statistics".into()), ("id", KEY_CHECK_VIDEO_ID.into())],
                key,
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    published_at: String,
    channel_id: String,
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    // The API encodes counters as decimal strings.
    view_count: Option<String>,
}

impl Statistics {
    fn views(&self) -> u64 {
        self.view_count
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct CommentThreadItem {
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
    #[serde(default)]
    total_reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CommentSnippet {
    author_display_name: String,
    text_original: String,
    like_count: u64,
    published_at: String,
}
