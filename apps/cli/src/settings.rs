use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use harvester_core::{DEFAULT_CONCURRENCY, KeyPool, transcript::DEFAULT_SERVER_BASE};

/// Persisted CLI preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_keys: Vec<String>,
    pub server_base: String,
    pub concurrency: usize,
    pub stt: bool,
    pub max_comments: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            server_base: DEFAULT_SERVER_BASE.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            stt: false,
            max_comments: 0,
        }
    }
}

pub fn get_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("harvester")
        .join("settings.json")
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&get_settings_path())
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring corrupt settings file");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = get_settings_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Keys from the command line win, then `YOUTUBE_API_KEYS`, then the
    /// settings file.
    pub fn key_pool(&self, flag: Option<&str>) -> KeyPool {
        select_keys(flag.map(KeyPool::parse), KeyPool::from_env().ok(), &self.api_keys)
    }

    pub fn masked_keys(&self) -> Vec<String> {
        self.api_keys.iter().map(|k| mask_key(k)).collect()
    }
}

fn select_keys(flag: Option<KeyPool>, env: Option<KeyPool>, saved: &[String]) -> KeyPool {
    [flag, env]
        .into_iter()
        .flatten()
        .find(|pool| !pool.is_empty())
        .unwrap_or_else(|| KeyPool::new(saved))
}

/// Keep only the first and last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
