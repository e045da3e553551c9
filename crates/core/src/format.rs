//! Printable HTML rendering of run results.
//!
//! The document is self-contained so it can be opened in a browser and
//! printed to PDF.

use chrono::{DateTime, Local};
use html_escape::encode_text;

use crate::types::{ResolvedChannel, ResultRecord};

const STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Noto Sans KR', sans-serif; color: #111827; margin: 24px; }
h1 { margin: 0 0 8px 0; }
h2 { margin: 16px 0 8px 0; font-size: 16px; }
.muted { color: #6b7280; font-size: 12px; }
.item { page-break-inside: avoid; margin: 16px 0; padding: 12px; border: 1px solid #e5e7eb; border-radius: 8px; }
.meta { color: #374151; font-size: 12px; margin-bottom: 8px; }
pre { white-space: pre-wrap; word-break: break-word; font-size: 12px; line-height: 1.5; }
ol.comments { font-size: 12px; color: #374151; }";

/// Who a report covers.
#[derive(Debug, Clone)]
pub enum ReportHeading {
    Channel(ResolvedChannel),
    /// Several channels in one document.
    Multi(usize),
    /// Pasted video list with no channel context.
    Videos,
}

impl ReportHeading {
    pub fn for_channels(channels: &[ResolvedChannel]) -> Self {
        match channels {
            [] => ReportHeading::Videos,
            [only] => ReportHeading::Channel(only.clone()),
            many => ReportHeading::Multi(many.len()),
        }
    }

    fn title(&self) -> String {
        match self {
            ReportHeading::Channel(ch) if !ch.title.is_empty() => ch.title.clone(),
            ReportHeading::Channel(ch) => ch.id.clone(),
            ReportHeading::Multi(n) => format!("{n} channels"),
            ReportHeading::Videos => "Video list".to_string(),
        }
    }

    fn subtitle(&self) -> String {
        match self {
            ReportHeading::Channel(ch) => format!("{} ({})", ch.title, ch.id),
            ReportHeading::Multi(n) => format!("{n} channels"),
            ReportHeading::Videos => "Video list".to_string(),
        }
    }
}

pub fn render_printable_html(heading: &ReportHeading, records: &[ResultRecord]) -> String {
    render_at(heading, records, Local::now())
}

fn render_at(heading: &ReportHeading, records: &[ResultRecord], generated: DateTime<Local>) -> String {
    let succeeded = records.iter().filter(|r| r.is_success()).count();
    let failed = records.len() - succeeded;

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>Transcripts - {}</title>\n",
        encode_text(&heading.title())
    ));
    out.push_str(&format!("<style>\n{STYLE}\n</style>\n</head><body>\n"));
    out.push_str("<h1>Channel transcripts</h1>\n");
    out.push_str(&format!(
        "<div class=\"muted\">{} &bull; generated {}</div>\n",
        encode_text(&heading.subtitle()),
        generated.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!(
        "<div class=\"muted\">{} total &bull; {succeeded} succeeded &bull; {failed} failed</div>\n<hr>\n",
        records.len()
    ));

    for (i, record) in records.iter().enumerate() {
        push_record(&mut out, i + 1, record);
    }

    out.push_str("</body></html>\n");
    out
}

fn push_record(out: &mut String, number: usize, record: &ResultRecord) {
    let title = if record.title.is_empty() {
        &record.id
    } else {
        &record.title
    };
    out.push_str("<div class=\"item\">");
    out.push_str(&format!("<h2>{number}. {}</h2>", encode_text(title)));

    let mut meta = format!(
        "ID: {} &bull; Published: {}",
        encode_text(&record.id),
        encode_text(&record.published_at)
    );
    if let Some(views) = record.views {
        meta.push_str(&format!(" &bull; Views: {views}"));
    }
    if let Some(channel) = record.channel_title.as_deref().filter(|c| !c.is_empty()) {
        meta.push_str(&format!(" &bull; Channel: {}", encode_text(channel)));
    }
    out.push_str(&format!("<div class=\"meta\">{meta}</div>"));

    match (record.transcript(), record.error()) {
        (Some(text), _) => out.push_str(&format!("<pre>{}</pre>", encode_text(text))),
        (None, error) => out.push_str(&format!(
            "<div class=\"muted\">Error: {}</div>",
            encode_text(error.unwrap_or("unknown"))
        )),
    }

    let comments = record.comments();
    if !comments.is_empty() {
        out.push_str("<ol class=\"comments\">");
        for c in comments {
            out.push_str(&format!(
                "<li><b>{}</b> ({} likes, {} replies): {}</li>",
                encode_text(&c.author),
                c.like_count,
                c.reply_count,
                encode_text(&c.text)
            ));
        }
        out.push_str("</ol>");
    }
    out.push_str("</div>\n");
}

/// One document per channel holding only that channel's records. Channels
/// with nothing recorded are left out.
pub fn split_by_channel(
    channels: &[ResolvedChannel],
    records: &[ResultRecord],
) -> Vec<(ResolvedChannel, String)> {
    channels
        .iter()
        .filter_map(|channel| {
            let own: Vec<ResultRecord> = records
                .iter()
                .filter(|r| r.channel_id.as_deref() == Some(channel.id.as_str()))
                .cloned()
                .collect();
            if own.is_empty() {
                return None;
            }
            let html = render_printable_html(&ReportHeading::Channel(channel.clone()), &own);
            Some((channel.clone(), html))
        })
        .collect()
}

/// File-name stem for a channel's report. The id keeps channels that share a
/// title from overwriting each other.
pub fn channel_file_stem(channel: &ResolvedChannel) -> String {
    let cleaned: String = channel
        .title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        channel.id.clone()
    } else {
        format!("{cleaned}_{}", channel.id)
    }
}
