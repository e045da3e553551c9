mod logging;
mod settings;
mod ui;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::warn;

use harvester_core::{
    AbortFlag, BatchEngine, DEFAULT_ITEM_TIMEOUT, DateRange, KeyPool, ListOptions,
    ReportHeading, ResolvedChannel, RunPhase, RunState, TranscriptCache, TranscriptClient,
    TranscriptWorker, WorkItem, YoutubeApi, clamp_concurrency, enrich_video_metadata,
    export::{json_file_name, write_json},
    format::channel_file_stem,
    list_videos_for_channels, parse_video_list, render_printable_html, resolve_channels,
    split_by_channel,
};

use crate::settings::{Settings, get_settings_path};

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Resolve YouTube channels and bulk-export their transcripts")]
struct Cli {
    /// YouTube Data API keys, comma separated (overrides YOUTUBE_API_KEYS and saved settings)
    #[arg(long, global = true)]
    keys: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve channel ids, handles, URLs or names to channel ids
    Resolve {
        #[arg(required = true)]
        channels: Vec<String>,
    },
    /// List the videos of one or more channels
    List {
        #[arg(required = true)]
        channels: Vec<String>,

        #[command(flatten)]
        filter: ListArgs,

        /// Write the video list as JSON to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Collect transcripts for channels or a file of video links
    Run(RunArgs),
    /// Check that API keys are accepted
    TestKey {
        /// Keys to test; defaults to the configured ones
        #[arg(value_name = "KEY")]
        candidates: Vec<String>,
    },
    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args)]
struct ListArgs {
    /// First publish date to include (YYYY-MM-DD, UTC+9)
    #[arg(long)]
    from: Option<String>,

    /// Last publish date to include (YYYY-MM-DD, UTC+9)
    #[arg(long)]
    to: Option<String>,

    /// Stop after this many videos per channel
    #[arg(long)]
    max: Option<usize>,

    /// Drop videos with fewer views
    #[arg(long)]
    min_views: Option<u64>,
}

impl ListArgs {
    fn options(&self) -> Result<ListOptions> {
        Ok(ListOptions {
            max_count: self.max,
            range: DateRange::parse_inclusive(self.from.as_deref(), self.to.as_deref())?,
            min_views: self.min_views,
        })
    }
}

#[derive(Args)]
struct RunArgs {
    /// Channels to list and harvest
    channels: Vec<String>,

    /// File with one video URL or id per line, instead of channels
    #[arg(long, conflicts_with = "channels")]
    videos: Option<PathBuf>,

    #[command(flatten)]
    filter: ListArgs,

    /// Concurrent transcript requests (1-20)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Transcript service base URL
    #[arg(long)]
    server: Option<String>,

    /// Ask the service for speech-to-text when captions are missing
    #[arg(long)]
    stt: bool,

    /// Attach up to this many top comments per video
    #[arg(long)]
    comments: Option<usize>,

    /// Per-video timeout in seconds
    #[arg(long, default_value_t = DEFAULT_ITEM_TIMEOUT.as_secs())]
    timeout: u64,

    /// Skip the local transcript cache
    #[arg(long)]
    no_cache: bool,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Also write a printable HTML report
    #[arg(long)]
    html: bool,

    /// Also write one printable HTML report per channel
    #[arg(long)]
    split: bool,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings (keys masked)
    Show,
    /// Change and save settings
    Set {
        /// Comma separated API keys
        #[arg(long)]
        api_keys: Option<String>,
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        stt: Option<bool>,
        #[arg(long)]
        comments: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::load();
    let keys = Arc::new(settings.key_pool(cli.keys.as_deref()));

    match cli.command {
        Command::Resolve { channels } => {
            let api = youtube(&keys)?;
            for channel in resolve(&api, &channels).await? {
                println!("{}\t{}", style(&channel.id).cyan(), channel.title);
            }
            Ok(())
        }
        Command::List {
            channels,
            filter,
            out,
        } => {
            let api = youtube(&keys)?;
            let opts = filter.options()?;
            let resolved = resolve(&api, &channels).await?;
            let videos = list(&api, &resolved, &opts, &AbortFlag::new()).await?;
            for v in &videos {
                println!(
                    "{}\t{}\t{}\t{}",
                    v.id,
                    v.published_at,
                    v.views.map(|n| n.to_string()).unwrap_or_default(),
                    v.title
                );
            }
            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&videos)?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                ui::check(format!("Saved {}", style(path.display()).dim()));
            }
            Ok(())
        }
        Command::Run(args) => run(args, &settings, keys).await,
        Command::TestKey { candidates } => test_keys(&keys, &candidates).await,
        Command::Settings { action } => settings_command(settings, action),
    }
}

fn youtube(keys: &Arc<KeyPool>) -> Result<YoutubeApi> {
    if keys.is_empty() {
        bail!(
            "no YouTube API keys configured; pass --keys, set YOUTUBE_API_KEYS or run `harvester settings set --api-keys`"
        );
    }
    Ok(YoutubeApi::new(Arc::clone(keys)))
}

async fn resolve(api: &YoutubeApi, inputs: &[String]) -> Result<Vec<ResolvedChannel>> {
    let spinner = ui::create_spinner(&format!("Resolving {} channel(s)...", inputs.len()));
    let resolved = resolve_channels(api, inputs).await;
    spinner.finish_and_clear();
    let resolved = resolved?;
    ui::check(format!(
        "Resolved {} of {} channel(s)",
        resolved.len(),
        inputs.len()
    ));
    Ok(resolved)
}

async fn list(
    api: &YoutubeApi,
    channels: &[ResolvedChannel],
    opts: &ListOptions,
    abort: &AbortFlag,
) -> Result<Vec<WorkItem>> {
    api.keys().reset();
    let spinner = ui::create_spinner("Listing videos...");
    let videos = list_videos_for_channels(api, channels, opts, abort).await;
    spinner.finish_and_clear();
    let videos = videos?;
    ui::check(format!("Listed {} video(s)", videos.len()));
    Ok(videos)
}

async fn run(args: RunArgs, settings: &Settings, keys: Arc<KeyPool>) -> Result<()> {
    let concurrency = clamp_concurrency(args.concurrency.unwrap_or(settings.concurrency));
    let server = args.server.clone().unwrap_or_else(|| settings.server_base.clone());
    let stt = args.stt || settings.stt;
    let max_comments = args.comments.unwrap_or(settings.max_comments);
    let engine = BatchEngine::new(concurrency, Duration::from_secs(args.timeout))?;
    let client = TranscriptClient::new(&server)?.with_stt(stt);

    println!(
        "\n{}  {}\n",
        style("harvester").cyan().bold(),
        style("Transcript Harvester").dim()
    );

    if let Err(e) = client.health().await {
        warn!(server = %client.base(), error = %e, "transcript service health check failed");
    }

    let state = RunState::new(Arc::clone(&keys));
    tokio::spawn(handle_interrupts(state.abort_flag()));

    let (channels, items) = gather_items(&args, &keys, &state.abort_flag()).await?;
    if state.abort_flag().is_aborted() {
        bail!("interrupted while listing videos");
    }
    if items.is_empty() {
        bail!("nothing to harvest");
    }

    let cache = if args.no_cache {
        TranscriptCache::disabled()
    } else {
        let cache = TranscriptCache::open_default().await;
        cache.spawn_startup_sweep(Duration::from_secs(5));
        cache
    };
    let mut worker = TranscriptWorker::new(client, cache);
    if max_comments > 0 && !keys.is_empty() {
        worker = worker.with_comments(YoutubeApi::new(Arc::clone(&keys)), max_comments);
    }

    let bar = ui::create_run_bar(items.len());
    let reporter_bar = bar.clone();
    let state = state.with_reporter(move |stats| {
        reporter_bar.set_position(stats.processed as u64);
        reporter_bar.set_message(ui::run_status(stats));
    });

    let summary = state.harvest(&engine, &worker, items).await?;
    bar.finish_and_clear();

    let stats = state.stats();
    let headline = format!(
        "Processed {}/{}: {} ok, {} failed in {}",
        summary.processed,
        summary.total,
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        ui::format_duration(stats.elapsed)
    );
    if state.phase() == RunPhase::Aborted {
        println!("{} {}", style("■").yellow().bold(), headline);
    } else {
        ui::check(headline);
    }
    let cache_stats = worker.cache().stats();
    if worker.cache().is_enabled() {
        println!(
            "  {}",
            style(format!("cache: {} hit(s), {} miss(es)", cache_stats.hits, cache_stats.misses)).dim()
        );
    }

    if let Err(e) = export_results(&args, &channels, &state).await {
        state.fail(&e);
        return Err(e);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Stop dispatching and let in-flight videos finish.
    Drain,
    Quit,
}

fn interrupt_action(presses: usize) -> Interrupt {
    if presses <= 1 {
        Interrupt::Drain
    } else {
        Interrupt::Quit
    }
}

async fn handle_interrupts(stop: AbortFlag) {
    let mut presses = 0;
    while tokio::signal::ctrl_c().await.is_ok() {
        presses += 1;
        match interrupt_action(presses) {
            Interrupt::Drain => {
                stop.abort();
                eprintln!(
                    "{} finishing in-flight videos, press Ctrl-C again to quit",
                    style("Stopping:").yellow().bold()
                );
            }
            Interrupt::Quit => std::process::exit(130),
        }
    }
}

/// Work list for a run: a pasted video file, or every listed video of the
/// given channels.
async fn gather_items(
    args: &RunArgs,
    keys: &Arc<KeyPool>,
    abort: &AbortFlag,
) -> Result<(Vec<ResolvedChannel>, Vec<WorkItem>)> {
    if let Some(path) = &args.videos {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let mut items = parse_video_list(&text);
        ui::check(format!("Read {} video(s) from {}", items.len(), path.display()));
        if keys.is_empty() {
            warn!("no API keys configured, video titles will be missing");
        } else {
            enrich_video_metadata(&YoutubeApi::new(Arc::clone(keys)), &mut items, abort).await;
        }
        return Ok((Vec::new(), items));
    }

    if args.channels.is_empty() {
        bail!("give at least one channel or --videos <FILE>");
    }
    let api = youtube(keys)?;
    let opts = args.filter.options()?;
    let channels = resolve(&api, &args.channels).await?;
    let items = list(&api, &channels, &opts, abort).await?;
    Ok((channels, items))
}

async fn export_results(args: &RunArgs, channels: &[ResolvedChannel], state: &RunState) -> Result<()> {
    let results = state.results();
    if results.is_empty() {
        println!("{}", style("No results to export").dim());
        return Ok(());
    }

    let today = Local::now().date_naive();
    let json_path = args.out.join(json_file_name(channels, today));
    write_json(&json_path, &results)
        .await
        .with_context(|| format!("writing {}", json_path.display()))?;
    ui::check(format!("Saved {}", style(json_path.display()).dim()));

    if args.html {
        let html = render_printable_html(&ReportHeading::for_channels(channels), &results);
        let path = json_path.with_extension("html");
        write_text(&path, &html).await?;
        ui::check(format!("Saved {}", style(path.display()).dim()));
    }

    if args.split {
        let stamp = today.format("%Y-%m-%d");
        for (channel, html) in split_by_channel(channels, &results) {
            let path = args
                .out
                .join(format!("transcripts_{}_{stamp}.html", channel_file_stem(&channel)));
            write_text(&path, &html).await?;
            ui::check(format!("Saved {}", style(path.display()).dim()));
        }
    }
    Ok(())
}

async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

async fn test_keys(configured: &KeyPool, given: &[String]) -> Result<()> {
    let keys: Vec<String> = if given.is_empty() {
        configured.keys().to_vec()
    } else {
        KeyPool::new(given).keys().to_vec()
    };
    if keys.is_empty() {
        bail!("no keys to test");
    }

    let api = YoutubeApi::new(Arc::new(KeyPool::new(&keys)));
    let mut failed = 0;
    for key in &keys {
        match api.test_key(key).await {
            Ok(()) => println!("{} {}", style("✓").green().bold(), settings::mask_key(key)),
            Err(e) => {
                failed += 1;
                println!("{} {} {}", style("✗").red().bold(), settings::mask_key(key), style(e).dim());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} key(s) rejected", keys.len());
    }
    Ok(())
}

fn settings_command(mut settings: Settings, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", style(get_settings_path().display()).dim());
            println!("api_keys:     {}", settings.masked_keys().join(", "));
            println!("server_base:  {}", settings.server_base);
            println!("concurrency:  {}", settings.concurrency);
            println!("stt:          {}", settings.stt);
            println!("max_comments: {}", settings.max_comments);
        }
        SettingsAction::Set {
            api_keys,
            server,
            concurrency,
            stt,
            comments,
        } => {
            if let Some(raw) = api_keys {
                settings.api_keys = KeyPool::parse(&raw).keys().to_vec();
            }
            if let Some(server) = server {
                TranscriptClient::new(&server)?;
                settings.server_base = server;
            }
            if let Some(n) = concurrency {
                settings.concurrency = clamp_concurrency(n);
            }
            if let Some(stt) = stt {
                settings.stt = stt;
            }
            if let Some(n) = comments {
                settings.max_comments = n;
            }
            let path = settings.save()?;
            ui::check(format!("Saved {}", style(path.display()).dim()));
        }
    }
    Ok(())
}
