use std::{sync::Arc, time::Duration};

use harvester_core::{
    AbortFlag, BatchEngine, KeyPool, ListOptions, ReportHeading, RunPhase, RunState,
    TranscriptCache, TranscriptClient, TranscriptWorker, YoutubeApi, export, list_channel_videos,
    parse_video_list, render_printable_html, resolve_channel,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

/// Mocks are removed when dropped, so they travel with the server.
async fn youtube_mock() -> (ServerGuard, Vec<Mock>) {
    let mut server = Server::new_async().await;
    let channels = server
        .mock("GET", "/channels")
        .match_query(Matcher::UrlEncoded("id".into(), "UCxxxxxxxxxxxxxxxxxxxxxx".into()))
        .with_body(json!({"items": [{"snippet": {"title": "Test Channel"}}]}).to_string())
        .create_async()
        .await;
    let search = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("type".into(), "video".into()))
        .with_body(
            json!({"items": [
                {"id": {"videoId": "okokokokok1"}, "snippet": {"title": "First", "publishedAt": "2024-02-01T00:00:00Z"}},
                {"id": {"videoId": "nocaptions2"}, "snippet": {"title": "Second", "publishedAt": "2024-01-01T00:00:00Z"}},
                {"id": {"videoId": "okokokokok3"}, "snippet": {"title": "Third", "publishedAt": "2023-12-01T00:00:00Z"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    let views = server
        .mock("GET", "/videos")
        .match_query(Matcher::UrlEncoded("part".into(), "statistics".into()))
        .with_body(
            json!({"items": [
                {"id": "okokokokok1", "statistics": {"viewCount": "1200"}},
                {"id": "nocaptions2", "statistics": {"viewCount": "900"}},
                {"id": "okokokokok3", "statistics": {"viewCount": "15"}}
            ]})
            .to_string(),
        )
        .create_async()
        .await;
    (server, vec![channels, search, views])
}

async fn transcript_mock() -> (ServerGuard, Vec<Mock>) {
    let mut server = Server::new_async().await;
    let found = server
        .mock("GET", "/transcript")
        .match_query(Matcher::Regex("okokokokok".into()))
        .with_body(json!({"text": "자막 내용", "lang": "ko"}).to_string())
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/transcript")
        .match_query(Matcher::Regex("nocaptions".into()))
        .with_status(404)
        .with_body(json!({"error": "no_transcript_or_stt"}).to_string())
        .create_async()
        .await;
    (server, vec![found, missing])
}

#[tokio::test]
async fn channel_to_export_end_to_end() {
    let (youtube, _youtube_mocks) = youtube_mock().await;
    let (transcripts, _transcript_mocks) = transcript_mock().await;
    let keys = Arc::new(KeyPool::new(["key-a", "key-b"]));
    let api = YoutubeApi::new(Arc::clone(&keys)).with_base_url(youtube.url());

    let channel = resolve_channel(&api, "UCxxxxxxxxxxxxxxxxxxxxxx").await.unwrap();
    assert_eq!(channel.title, "Test Channel");

    let opts = ListOptions {
        min_views: Some(100),
        ..ListOptions::default()
    };
    let videos = list_channel_videos(&api, &channel, &opts, &AbortFlag::new()).await.unwrap();
    assert_eq!(videos.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let worker = TranscriptWorker::new(
        TranscriptClient::new(transcripts.url()).unwrap(),
        TranscriptCache::open(dir.path()).await,
    );
    let engine = BatchEngine::new(2, Duration::from_secs(10)).unwrap();
    let state = RunState::new(keys);

    let summary = state.harvest(&engine, &worker, videos).await.unwrap();

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    assert_eq!(state.phase(), RunPhase::Completed);

    let mut results = state.results();
    results.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(results[0].id, "nocaptions2");
    assert_eq!(results[0].error(), Some("Transcript http 404 no_transcript_or_stt"));
    assert_eq!(results[1].transcript(), Some("자막 내용"));
    assert_eq!(results[1].channel_title.as_deref(), Some("Test Channel"));

    let json = export::to_json(&results).unwrap();
    assert_eq!(export::from_json(&json).unwrap(), results);

    let html = render_printable_html(&ReportHeading::Channel(channel), &results);
    assert!(html.contains("2 total &bull; 1 succeeded &bull; 1 failed"));
}

#[tokio::test]
async fn aborted_run_keeps_partial_results() {
    let (transcripts, _mocks) = transcript_mock().await;
    let worker = TranscriptWorker::new(
        TranscriptClient::new(transcripts.url()).unwrap(),
        TranscriptCache::disabled(),
    );
    let state = RunState::new(Arc::new(KeyPool::default()));
    let abort = state.abort_flag();
    let state = state.with_reporter(move |stats| {
        if stats.processed == 1 {
            abort.abort();
        }
    });
    let engine = BatchEngine::new(1, Duration::from_secs(10)).unwrap();
    let items = parse_video_list("okokokokok1\nokokokokok3\nokokokokok4");

    let summary = state.harvest(&engine, &worker, items).await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.processed, 1);
    assert_eq!(state.phase(), RunPhase::Aborted);
    let results = state.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "okokokokok1");
    assert_eq!(results[0].transcript(), Some("자막 내용"));
}
