use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tokio::{fs, task::JoinHandle};
use tracing::{debug, info, warn};

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

static STARTUP_SWEEP_SCHEDULED: AtomicBool = AtomicBool::new(false);

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("harvester")
}

/// Default location of cached transcripts.
pub fn get_transcript_cache_dir() -> PathBuf {
    get_root_cache_dir().join("transcripts")
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    payload: String,
    written_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Disk-backed transcript cache, keyed by video id.
///
/// An entry older than the TTL reads as absent even while the file is still
/// on disk; the sweep only reclaims space.
#[derive(Clone)]
pub struct TranscriptCache {
    dir: Option<Arc<PathBuf>>,
    ttl: Duration,
    counters: Arc<Counters>,
}

impl TranscriptCache {
    /// Open a cache rooted at `dir`. If the directory cannot be created the
    /// cache degrades to one that always misses.
    pub async fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir).await {
            Ok(()) => Self {
                dir: Some(Arc::new(dir)),
                ttl: CACHE_TTL,
                counters: Arc::default(),
            },
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "transcript cache unavailable, continuing without it");
                Self::disabled()
            }
        }
    }

    pub async fn open_default() -> Self {
        Self::open(get_transcript_cache_dir()).await
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            ttl: CACHE_TTL,
            counters: Arc::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let found = match &self.dir {
            Some(dir) => self.read_fresh(&entry_path(dir, key)).await,
            None => None,
        };
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    async fn read_fresh(&self, path: &Path) -> Option<String> {
        let raw = fs::read_to_string(path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                return None;
            }
        };
        if is_expired(entry.written_at_ms, now_ms(), self.ttl) {
            return None;
        }
        Some(entry.payload)
    }

    /// Store `payload` stamped with the current time. The write runs in the
    /// background; failures are logged and never reach the caller.
    pub fn put(&self, key: &str, payload: String) -> JoinHandle<()> {
        self.put_at(key, payload, now_ms())
    }

    pub(crate) fn put_at(&self, key: &str, payload: String, written_at_ms: u64) -> JoinHandle<()> {
        let Some(dir) = self.dir.clone() else {
            return tokio::spawn(async {});
        };
        let path = entry_path(&dir, key);
        tokio::spawn(async move {
            let entry = CacheEntry {
                payload,
                written_at_ms,
            };
            let result = match serde_json::to_vec(&entry) {
                Ok(bytes) => fs::write(&path, bytes).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "failed to write cache entry");
            }
        })
    }

    /// Delete every entry whose timestamp is older than `now - ttl`.
    pub async fn sweep_expired(&self) -> usize {
        let Some(dir) = &self.dir else {
            return 0;
        };
        let Ok(mut entries) = fs::read_dir(dir.as_path()).await else {
            return 0;
        };

        let now = now_ms();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path).await else {
                continue;
            };
            let Ok(parsed) = serde_json::from_str::<CacheEntry>(&raw) else {
                continue;
            };
            if is_expired(parsed.written_at_ms, now, self.ttl) && fs::remove_file(&path).await.is_ok()
            {
                removed += 1;
            }
        }
        removed
    }

    /// Schedule one sweep shortly after startup. Later calls in the same
    /// process do nothing.
    pub fn spawn_startup_sweep(&self, delay: Duration) -> Option<JoinHandle<()>> {
        if !self.is_enabled() || STARTUP_SWEEP_SCHEDULED.swap(true, Ordering::SeqCst) {
            return None;
        }
        let cache = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!(removed, "swept expired transcript cache entries");
            }
        }))
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{safe}.json"))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn is_expired(written_at_ms: u64, now_ms: u64, ttl: Duration) -> bool {
    now_ms.saturating_sub(written_at_ms) >= ttl.as_millis() as u64
}
