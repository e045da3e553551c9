use std::{collections::HashSet, sync::LazyLock, time::Duration};

use regex::Regex;
use tracing::warn;

use crate::{
    abort::AbortFlag,
    retry::{RetryPolicy, pause},
    types::WorkItem,
    youtube::{MAX_PAGE_SIZE, YoutubeApi},
};

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid bare id regex"));

static URL_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?(?:.*&)?v=([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"youtube\.com/shorts/([A-Za-z0-9_-]{11})",
        r"youtube\.com/embed/([A-Za-z0-9_-]{11})",
        r"youtube\.com/live/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid video url regex"))
    .collect()
});

/// Extract the 11-character video id from a URL or a bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    URL_SHAPES
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| caps[1].to_string())
}

/// One work item per recognisable line, first occurrence wins. Lines that
/// are not videos are dropped without complaint.
pub fn parse_video_list(text: &str) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(extract_video_id)
        .filter(|id| seen.insert(id.clone()))
        .map(WorkItem::from_id)
        .collect()
}

/// Fill in title, publish date, channel and view count for pasted videos.
/// Batches that keep failing leave their items untouched.
pub async fn enrich_video_metadata(api: &YoutubeApi, items: &mut [WorkItem], abort: &AbortFlag) {
    enrich_video_metadata_with(api, items, abort, &RetryPolicy::view_counts()).await
}

pub(crate) async fn enrich_video_metadata_with(
    api: &YoutubeApi,
    items: &mut [WorkItem],
    abort: &AbortFlag,
    policy: &RetryPolicy,
) {
    for chunk in items.chunks_mut(MAX_PAGE_SIZE) {
        if abort.is_aborted() {
            break;
        }
        let ids: Vec<String> = chunk.iter().map(|v| v.id.clone()).collect();
        match policy.run("video details", abort, || api.video_details(&ids)).await {
            Ok(details) => {
                for item in chunk.iter_mut() {
                    if let Some(found) = details.iter().find(|d| d.id == item.id) {
                        item.title = found.title.clone();
                        item.published_at = found.published_at.clone();
                        item.views = found.views;
                        item.channel_id = found.channel_id.clone();
                        item.channel_title = found.channel_title.clone();
                    }
                }
            }
            Err(e) => warn!(error = %e, "[list] video details failed"),
        }
        pause(Duration::from_millis(120), Duration::from_millis(120)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::keys::KeyPool;

    #[test]
    fn recognises_every_url_shape() {
        let id = "dQw4w9WgXcQ";
        for input in [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "   dQw4w9WgXcQ  ",
        ] {
            assert_eq!(extract_video_id(input).as_deref(), Some(id), "input: {input}");
        }
    }

    #[test]
    fn rejects_non_video_lines() {
        assert_eq!(extract_video_id("not a video"), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn dedupes_preserving_first_seen_order() {
        let text = "\
https://youtu.be/BBBBBBBBBBB
garbage line
AAAAAAAAAAA
https://www.youtube.com/watch?v=BBBBBBBBBBB

https://www.youtube.com/shorts/CCCCCCCCCCC";
        let ids: Vec<String> = parse_video_list(text).into_iter().map(|v| v.id).collect();
        assert_eq!(ids, ["BBBBBBBBBBB", "AAAAAAAAAAA", "CCCCCCCCCCC"]);
    }

    #[test]
    fn parsed_items_get_canonical_urls() {
        let items = parse_video_list("https://youtu.be/AAAAAAAAAAA");
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=AAAAAAAAAAA");
    }

    #[tokio::test]
    async fn enrichment_merges_details_by_id() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/videos")
            .match_query(Matcher::UrlEncoded("part".into(), "snippet,statistics".into()))
            .with_body(
                json!({"items": [{
                    "id": "AAAAAAAAAAA",
                    "snippet": {"title": "First", "publishedAt": "2024-01-02T03:04:05Z",
                                "channelId": "UCchan", "channelTitle": "Chan"},
                    "statistics": {"viewCount": "77"}
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        let api = YoutubeApi::new(Arc::new(KeyPool::new(["k"]))).with_base_url(server.url());
        let mut items = parse_video_list("AAAAAAAAAAA\nBBBBBBBBBBB");

        enrich_video_metadata(&api, &mut items, &AbortFlag::new()).await;

        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].views, Some(77));
        assert_eq!(items[0].channel_title.as_deref(), Some("Chan"));
        assert_eq!(items[1].title, "");
        assert_eq!(items[1].views, None);
    }
}
