use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Media search results stay fresh for an hour.
pub const DEFAULT_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// Small key/value cache persisted as one JSON file.
pub struct MediaCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MediaCache {
    /// Opens the cache file; a missing or corrupt file starts empty and
    /// expired entries are dropped on load.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut entries: HashMap<String, CacheEntry> = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(err) => {
                    tracing::warn!(target: "cache", "discarding unreadable cache {:?}: {}", path, err);
                    None
                }
            })
            .unwrap_or_default();
        let now = Utc::now();
        entries.retain(|_, e| now < e.expires_at);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now >= entry.expires_at {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.put_with_ttl(key, value, DEFAULT_CACHE_TTL)
    }

    pub fn put_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: std::time::Duration,
    ) -> Result<(), CacheError> {
        self.put_at(key, value, ttl, Utc::now())
    }

    pub fn put_at<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365 * 100));
        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            expires_at: now + ttl,
        };
        let mut entries = self.entries.lock();
        entries.retain(|_, e| now < e.expires_at);
        entries.insert(key.to_string(), entry);
        self.persist(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock();
        let removed = entries.remove(key).is_some();
        if removed {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Drops expired entries, returning how many went.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        let purged = before - entries.len();
        if purged > 0 {
            self.persist(&entries)?;
        }
        Ok(purged)
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
