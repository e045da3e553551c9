use std::path::Path;

use chrono::NaiveDate;

use crate::{
    error::Result,
    types::{ResolvedChannel, ResultRecord},
};

/// Pretty-printed JSON array of records.
pub fn to_json(records: &[ResultRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn from_json(raw: &str) -> Result<Vec<ResultRecord>> {
    Ok(serde_json::from_str(raw)?)
}

pub async fn write_json(path: &Path, records: &[ResultRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, to_json(records)?).await?;
    Ok(())
}

/// `transcripts_<scope>_<date>.json` where scope is `multi` for several
/// channels, the channel id for one, and `channel` when none was resolved.
pub fn json_file_name(channels: &[ResolvedChannel], date: NaiveDate) -> String {
    let scope = match channels {
        [] => "channel",
        [only] if !only.id.is_empty() => only.id.as_str(),
        [_] => "channel",
        _ => "multi",
    };
    format!("transcripts_{scope}_{}.json", date.format("%Y-%m-%d"))
}
