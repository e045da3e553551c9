use std::time::Duration;

use tracing::{info, warn};

use crate::{
    abort::AbortFlag,
    error::{HarvestError, Result},
    resolve::DateRange,
    retry::{RetryPolicy, pause},
    types::{ResolvedChannel, WorkItem},
    youtube::{MAX_PAGE_SIZE, YoutubeApi},
};

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Stop paginating once this many videos were collected.
    pub max_count: Option<usize>,
    pub range: DateRange,
    /// Post-filter on view count; does not change how many pages are fetched.
    pub min_views: Option<u64>,
}

/// Delays used while walking pages.
#[derive(Debug, Clone)]
pub(crate) struct Pacing {
    pub page_gap: (Duration, Duration),
    pub channel_gap: (Duration, Duration),
    pub page_retry: RetryPolicy,
    pub views_retry: RetryPolicy,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_gap: (Duration::from_millis(120), Duration::from_millis(120)),
            channel_gap: (Duration::from_millis(200), Duration::from_millis(200)),
            page_retry: RetryPolicy::page_listing(),
            views_retry: RetryPolicy::view_counts(),
        }
    }
}

/// Enumerate a channel's videos newest first, then attach view counts and
/// apply the minimum-views filter.
///
/// A failing page is retried until it succeeds; only `abort` ends that loop,
/// in which case whatever was collected so far is returned.
pub async fn list_channel_videos(
    api: &YoutubeApi,
    channel: &ResolvedChannel,
    opts: &ListOptions,
    abort: &AbortFlag,
) -> Result<Vec<WorkItem>> {
    list_channel_videos_with(api, channel, opts, abort, &Pacing::default()).await
}

pub(crate) async fn list_channel_videos_with(
    api: &YoutubeApi,
    channel: &ResolvedChannel,
    opts: &ListOptions,
    abort: &AbortFlag,
    pacing: &Pacing,
) -> Result<Vec<WorkItem>> {
    let cap = opts.max_count.filter(|&n| n > 0);
    let mut all: Vec<WorkItem> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        if abort.is_aborted() {
            break;
        }
        let fetched = pacing
            .page_retry
            .run("[list] page", abort, || {
                api.search_channel_videos(&channel.id, &opts.range, page_token.as_deref())
            })
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(HarvestError::Aborted) => break,
            Err(e) => return Err(e),
        };

        all.extend(page.items.into_iter().map(|v| v.with_channel(channel)));
        if let Some(cap) = cap {
            if all.len() >= cap {
                all.truncate(cap);
                break;
            }
        }
        match page.next_page_token {
            Some(next) => page_token = Some(next),
            None => break,
        }
        pause(pacing.page_gap.0, pacing.page_gap.1).await;
    }

    attach_view_counts(api, &mut all, abort, pacing).await;

    let listed = all.len();
    let filtered: Vec<WorkItem> = match opts.min_views {
        Some(min) if min > 0 => all
            .into_iter()
            .filter(|v| v.views.unwrap_or(0) >= min)
            .collect(),
        _ => all,
    };
    info!(
        channel = %channel.title,
        id = %channel.id,
        listed,
        kept = filtered.len(),
        "[list] channel videos"
    );
    Ok(filtered)
}

async fn attach_view_counts(
    api: &YoutubeApi,
    videos: &mut [WorkItem],
    abort: &AbortFlag,
    pacing: &Pacing,
) {
    for chunk in videos.chunks_mut(MAX_PAGE_SIZE) {
        if abort.is_aborted() {
            break;
        }
        let ids: Vec<String> = chunk.iter().map(|v| v.id.clone()).collect();
        match pacing
            .views_retry
            .run("[list] views", abort, || api.view_counts(&ids))
            .await
        {
            Ok(views) => {
                for video in chunk.iter_mut() {
                    if let Some(&count) = views.get(&video.id) {
                        video.views = Some(count);
                    }
                }
            }
            Err(e) => warn!(error = %e, "[list] views lookup failed"),
        }
        pause(pacing.page_gap.0, pacing.page_gap.1).await;
    }
}

/// List every channel in turn and concatenate the results.
pub async fn list_videos_for_channels(
    api: &YoutubeApi,
    channels: &[ResolvedChannel],
    opts: &ListOptions,
    abort: &AbortFlag,
) -> Result<Vec<WorkItem>> {
    list_videos_for_channels_with(api, channels, opts, abort, &Pacing::default()).await
}

pub(crate) async fn list_videos_for_channels_with(
    api: &YoutubeApi,
    channels: &[ResolvedChannel],
    opts: &ListOptions,
    abort: &AbortFlag,
    pacing: &Pacing,
) -> Result<Vec<WorkItem>> {
    let mut videos = Vec::new();
    for (i, channel) in channels.iter().enumerate() {
        if abort.is_aborted() {
            break;
        }
        videos.extend(list_channel_videos_with(api, channel, opts, abort, pacing).await?);
        if i + 1 < channels.len() {
            pause(pacing.channel_gap.0, pacing.channel_gap.1).await;
        }
    }
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockito::{Matcher, Server};
    use serde_json::{Value, json};

    use super::*;
    use crate::keys::KeyPool;

    fn api(server: &Server) -> YoutubeApi {
        YoutubeApi::new(Arc::new(KeyPool::new(["k1", "k2"]))).with_base_url(server.url())
    }

    /// Base URL of a server that accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    fn instant() -> Pacing {
        let zero = (Duration::ZERO, Duration::ZERO);
        Pacing {
            page_gap: zero,
            channel_gap: zero,
            page_retry: RetryPolicy::page_listing().with_delay(zero.0, zero.1),
            views_retry: RetryPolicy::view_counts().with_delay(zero.0, zero.1),
        }
    }

    fn channel() -> ResolvedChannel {
        ResolvedChannel {
            id: "UCchan".into(),
            title: "Chan".into(),
        }
    }

    fn search_page(ids: &[&str], next: Option<&str>) -> String {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({"id": {"kind": "youtube#video", "videoId": id},
                       "snippet": {"title": format!("title {id}"), "publishedAt": "2024-01-01T00:00:00Z"}})
            })
            .collect();
        let mut body = json!({ "items": items });
        if let Some(next) = next {
            body["nextPageToken"] = json!(next);
        }
        body.to_string()
    }

    async fn mock_views(server: &mut Server, views: Value) -> mockito::Mock {
        server
            .mock("GET", "/videos")
            .match_query(Matcher::UrlEncoded("part".into(), "statistics".into()))
            .with_body(json!({ "items": views }).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn follows_page_tokens_and_stamps_channel() {
        let mut server = Server::new_async().await;
        let _p1 = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("channelId".into(), "UCchan".into()))
            .with_body(search_page(&["v1", "v2"], Some("NEXT")))
            .expect(1)
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "NEXT".into()))
            .with_body(search_page(&["v3"], None))
            .expect(1)
            .create_async()
            .await;
        let _views = mock_views(&mut server, json!([])).await;

        let videos =
            list_channel_videos_with(&api(&server), &channel(), &ListOptions::default(), &AbortFlag::new(), &instant())
                .await
                .unwrap();

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v2", "v3"]);
        assert!(videos.iter().all(|v| v.channel_id.as_deref() == Some("UCchan")));
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=v1");
    }

    #[tokio::test]
    async fn max_count_stops_pagination_early() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_body(search_page(&["v1", "v2", "v3"], Some("MORE")))
            .expect(1)
            .create_async()
            .await;
        let _views = mock_views(&mut server, json!([])).await;

        let opts = ListOptions {
            max_count: Some(2),
            ..ListOptions::default()
        };
        let videos = list_channel_videos_with(&api(&server), &channel(), &opts, &AbortFlag::new(), &instant())
            .await
            .unwrap();

        assert_eq!(videos.len(), 2);
        first.assert_async().await;
    }

    #[tokio::test]
    async fn date_range_is_sent_as_rfc3339_bounds() {
        let mut server = Server::new_async().await;
        let search = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("publishedAfter".into(), "2024-02-29T15:00:00Z".into()),
                Matcher::UrlEncoded("publishedBefore".into(), "2024-03-31T15:00:00Z".into()),
                Matcher::UrlEncoded("order".into(), "date".into()),
                Matcher::UrlEncoded("maxResults".into(), "50".into()),
            ]))
            .with_body(search_page(&[], None))
            .expect(1)
            .create_async()
            .await;

        let opts = ListOptions {
            range: DateRange::parse_inclusive(Some("2024-03-01"), Some("2024-03-31")).unwrap(),
            ..ListOptions::default()
        };
        let videos = list_channel_videos_with(&api(&server), &channel(), &opts, &AbortFlag::new(), &instant())
            .await
            .unwrap();

        assert!(videos.is_empty());
        search.assert_async().await;
    }

    #[tokio::test]
    async fn failed_page_is_retried_not_skipped() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_body(search_page(&["v1"], None))
            .expect(1)
            .create_async()
            .await;
        let _views = mock_views(&mut server, json!([])).await;

        let videos =
            list_channel_videos_with(&api(&server), &channel(), &ListOptions::default(), &AbortFlag::new(), &instant())
                .await
                .unwrap();

        assert_eq!(videos.len(), 1);
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn min_views_filters_after_listing() {
        let mut server = Server::new_async().await;
        let _search = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_body(search_page(&["low", "high", "unknown"], None))
            .create_async()
            .await;
        let _views = mock_views(
            &mut server,
            json!([
                {"id": "low", "statistics": {"viewCount": "10"}},
                {"id": "high", "statistics": {"viewCount": "5000"}}
            ]),
        )
        .await;

        let opts = ListOptions {
            min_views: Some(100),
            ..ListOptions::default()
        };
        let videos = list_channel_videos_with(&api(&server), &channel(), &opts, &AbortFlag::new(), &instant())
            .await
            .unwrap();

        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "high");
        assert_eq!(videos[0].views, Some(5000));
    }

    #[tokio::test]
    async fn aborted_listing_returns_nothing_new() {
        let server = Server::new_async().await;
        let abort = AbortFlag::new();
        abort.abort();

        let videos =
            list_channel_videos_with(&api(&server), &channel(), &ListOptions::default(), &abort, &instant())
                .await
                .unwrap();
        assert!(videos.is_empty());
    }

    #[tokio::test]
    async fn multiple_channels_are_concatenated_in_order() {
        let mut server = Server::new_async().await;
        let _a = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("channelId".into(), "UCa".into()))
            .with_body(search_page(&["a1"], None))
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("channelId".into(), "UCb".into()))
            .with_body(search_page(&["b1", "b2"], None))
            .create_async()
            .await;
        let _views = mock_views(&mut server, json!([])).await;

        let channels = [
            ResolvedChannel { id: "UCa".into(), title: "A".into() },
            ResolvedChannel { id: "UCb".into(), title: "B".into() },
        ];
        let videos = list_videos_for_channels_with(
            &api(&server),
            &channels,
            &ListOptions::default(),
            &AbortFlag::new(),
            &instant(),
        )
        .await
        .unwrap();

        let owners: Vec<&str> = videos.iter().filter_map(|v| v.channel_title.as_deref()).collect();
        assert_eq!(owners, ["A", "B", "B"]);
    }

    #[tokio::test]
    async fn abort_ends_listing_while_requests_stall() {
        let api = YoutubeApi::new(Arc::new(KeyPool::new(["k"])))
            .with_base_url(silent_server().await)
            .with_request_timeout(Duration::from_millis(200));
        let channel = ResolvedChannel {
            id: "UCstalled".into(),
            title: "Stalled".into(),
        };
        let abort = AbortFlag::new();
        let stop = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop.abort();
        });

        let listed = tokio::time::timeout(
            Duration::from_secs(5),
            list_channel_videos_with(&api, &channel, &ListOptions::default(), &abort, &instant()),
        )
        .await
        .expect("listing ends once aborted");

        assert!(listed.unwrap().is_empty());
    }
}
