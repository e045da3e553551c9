use serde::{Deserialize, Serialize};

pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{video_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// One video queued for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub published_at: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
}

impl WorkItem {
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            url: watch_url(&id),
            id,
            title: String::new(),
            published_at: String::new(),
            views: None,
            channel_id: None,
            channel_title: None,
        }
    }

    pub fn with_channel(mut self, channel: &ResolvedChannel) -> Self {
        self.channel_id = Some(channel.id.clone());
        self.channel_title = Some(channel.title.clone());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub published_at: String,
}

impl Comment {
    /// Popularity used to rank comments: likes plus double weight for replies.
    pub fn score(&self) -> u64 {
        self.like_count + 2 * self.reply_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordOutcome {
    Transcript {
        transcript: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        comments: Vec<Comment>,
    },
    Error {
        error: String,
    },
}

/// Outcome of one work item. Exactly one record exists per settled item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

impl ResultRecord {
    pub fn success(item: &WorkItem, transcript: String, comments: Vec<Comment>) -> Self {
        Self::from_item(
            item,
            RecordOutcome::Transcript {
                transcript,
                comments,
            },
        )
    }

    pub fn failure(item: &WorkItem, error: impl Into<String>) -> Self {
        Self::from_item(
            item,
            RecordOutcome::Error {
                error: error.into(),
            },
        )
    }

    fn from_item(item: &WorkItem, outcome: RecordOutcome) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            published_at: item.published_at.clone(),
            url: item.url.clone(),
            views: item.views,
            channel_id: item.channel_id.clone(),
            channel_title: item.channel_title.clone(),
            outcome,
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        match &self.outcome {
            RecordOutcome::Transcript { transcript, .. } => Some(transcript),
            RecordOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            RecordOutcome::Error { error } => Some(error),
            RecordOutcome::Transcript { .. } => None,
        }
    }

    pub fn comments(&self) -> &[Comment] {
        match &self.outcome {
            RecordOutcome::Transcript { comments, .. } => comments,
            RecordOutcome::Error { .. } => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        self.transcript().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_record_serializes_error_without_transcript() {
        let item = WorkItem::from_id("dQw4w9WgXcQ");
        let record = ResultRecord::failure(&item, "Transcript http 404");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["error"], "Transcript http 404");
        assert!(json.get("views").is_none());
        assert!(json.get("transcript").is_none());
        assert_eq!(json["url"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn success_record_uses_camel_case_fields() {
        let channel = ResolvedChannel {
            id: "UC123".into(),
            title: "Chan".into(),
        };
        let mut item = WorkItem::from_id("dQw4w9WgXcQ").with_channel(&channel);
        item.published_at = "2024-01-01T00:00:00Z".into();
        item.views = Some(1_234);
        let record = ResultRecord::success(&item, "hello".into(), Vec::new());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["views"], 1_234);
        assert_eq!(json["publishedAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["channelTitle"], "Chan");
        assert_eq!(json["transcript"], "hello");
        assert!(json.get("comments").is_none());
    }

    #[test]
    fn replies_weigh_more_than_likes() {
        let liked = Comment {
            author: "a".into(),
            text: "x".into(),
            like_count: 5,
            reply_count: 0,
            published_at: String::new(),
        };
        let discussed = Comment {
            reply_count: 3,
            like_count: 0,
            ..liked.clone()
        };
        assert!(discussed.score() > liked.score());
    }
}
