use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use harvester_core::RunStats;

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn create_run_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(bar) = ProgressStyle::default_bar()
        .template("{bar:30.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(bar.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    pb
}

pub fn run_status(stats: &RunStats) -> String {
    let eta = stats
        .eta
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} ok {} fail • elapsed {} • eta {}",
        style(stats.succeeded).green(),
        style(stats.failed).red(),
        format_duration(stats.elapsed),
        eta
    )
}

/// `h:mm:ss` above an hour, `m:ss` below.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

pub fn check(msg: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}
