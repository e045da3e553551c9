use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{HarvestError, Result};

pub const KEYS_ENV_VAR: &str = "YOUTUBE_API_KEYS";

/// Round-robin pool of YouTube Data API keys.
///
/// Every outbound request takes the next key, regardless of how the previous
/// request with that key went.
#[derive(Debug, Default)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Parse a comma or newline separated key list.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split([',', '\n', '\r']))
    }

    /// Read keys from the `YOUTUBE_API_KEYS` environment variable.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(KEYS_ENV_VAR).map_err(|_| {
            HarvestError::configuration(format!("{KEYS_ENV_VAR} environment variable is not set"))
        })?;
        let pool = Self::parse(&raw);
        if pool.is_empty() {
            return Err(HarvestError::configuration(format!(
                "{KEYS_ENV_VAR} contains no keys"
            )));
        }
        Ok(pool)
    }

    pub fn next(&self) -> Result<String> {
        if self.keys.is_empty() {
            return Err(HarvestError::configuration("YouTube API key pool is empty"));
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(self.keys[i % self.keys.len()].clone())
    }

    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
