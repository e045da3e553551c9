use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::{
    cache::TranscriptCache,
    transcript::TranscriptClient,
    types::{Comment, WorkItem},
    workers::Worker,
    youtube::YoutubeApi,
};

/// What the transcript worker produces for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvested {
    pub transcript: String,
    pub comments: Vec<Comment>,
    pub from_cache: bool,
}

/// Fetches a video's transcript (through the cache) and, optionally, its
/// top comments.
pub struct TranscriptWorker {
    client: TranscriptClient,
    cache: TranscriptCache,
    api: Option<YoutubeApi>,
    max_comments: usize,
}

impl TranscriptWorker {
    pub fn new(client: TranscriptClient, cache: TranscriptCache) -> Self {
        Self {
            client,
            cache,
            api: None,
            max_comments: 0,
        }
    }

    /// Also attach up to `max` top comments per video; `0` disables it.
    pub fn with_comments(mut self, api: YoutubeApi, max: usize) -> Self {
        self.api = Some(api);
        self.max_comments = max;
        self
    }

    pub fn cache(&self) -> &TranscriptCache {
        &self.cache
    }

    async fn transcript(&self, item: &WorkItem) -> Result<(String, bool)> {
        if let Some(text) = self.cache.get(&item.id).await {
            debug!(id = %item.id, "transcript cache hit");
            return Ok((text, true));
        }

        let response = self.client.fetch(&item.url).await?;
        if response.text.trim().is_empty() {
            match response.error {
                Some(error) => bail!("empty transcript ({error})"),
                None => bail!("empty transcript"),
            }
        }
        // Fire-and-forget; the cache logs its own write failures.
        let _ = self.cache.put(&item.id, response.text.clone());
        Ok((response.text, false))
    }

    async fn comments(&self, item: &WorkItem) -> Vec<Comment> {
        let Some(api) = self.api.as_ref().filter(|_| self.max_comments > 0) else {
            return Vec::new();
        };
        match api.top_comments(&item.id, self.max_comments).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(id = %item.id, error = %e, "comments unavailable");
                Vec::new()
            }
        }
    }
}

impl Worker<WorkItem> for TranscriptWorker {
    type Output = Harvested;

    async fn process(&self, item: &WorkItem) -> Result<Harvested> {
        let (transcript, comments) = tokio::join!(self.transcript(item), self.comments(item));
        let (transcript, from_cache) = transcript?;
        Ok(Harvested {
            transcript,
            comments,
            from_cache,
        })
    }
}
