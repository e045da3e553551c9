pub mod abort;
pub mod batch;
pub mod cache;
pub mod error;
pub mod export;
pub mod format;
pub mod keys;
pub mod resolve;
pub mod retry;
pub mod run;
pub mod transcript;
pub mod types;
pub mod workers;
pub mod youtube;

pub use abort::AbortFlag;
pub use batch::{
    BatchEngine, BatchObserver, BatchSummary, DEFAULT_CONCURRENCY, DEFAULT_ITEM_TIMEOUT,
    ItemOutcome, clamp_concurrency,
};
pub use cache::{CacheStats, TranscriptCache, get_root_cache_dir, get_transcript_cache_dir};
pub use error::{HarvestError, ItemError, Result};
pub use export::{json_file_name, to_json, write_json};
pub use format::{ReportHeading, render_printable_html, split_by_channel};
pub use keys::KeyPool;
pub use resolve::{
    DateRange, ListOptions, enrich_video_metadata, list_channel_videos, list_videos_for_channels,
    parse_video_list, resolve_channel, resolve_channels,
};
pub use run::{RunPhase, RunState, RunStats};
pub use transcript::{TranscriptClient, TranscriptResponse};
pub use types::{Comment, ResolvedChannel, ResultRecord, WorkItem};
pub use workers::{Harvested, TranscriptWorker, Worker};
pub use youtube::YoutubeApi;
