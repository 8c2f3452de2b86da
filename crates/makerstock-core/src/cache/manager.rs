use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::store::{DurableStore, FileStore, MemoryStore};

/// Entries older than this are no longer fresh.
/// Stock changes a few times a day, so an hour keeps reads cheap without
/// hiding borrows for long.
pub const CACHE_TTL_MINUTES: i64 = 60;

/// Prefix shared by every durable cache key.
pub const STORAGE_PREFIX: &str = "inv-cache:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.timestamp).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        Utc::now() - self.timestamp > Duration::minutes(CACHE_TTL_MINUTES)
    }
}

/// Two-tier response cache.
///
/// The in-process map is checked first; the durable store survives restarts
/// and hydrates the map on a hit. Durable-tier failures are logged and
/// otherwise ignored, so the in-process tier stays authoritative for the
/// session.
pub struct CacheManager {
    memory: Mutex<HashMap<String, CachedData<Value>>>,
    store: Box<dyn DurableStore>,
}

impl CacheManager {
    pub fn new(store: impl DurableStore + 'static) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store: Box::new(store),
        }
    }

    /// File-backed cache in `cache_dir`.
    pub fn open(cache_dir: PathBuf) -> Result<Self> {
        Ok(Self::new(FileStore::new(cache_dir)?))
    }

    /// Cache that forgets everything when the process exits.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CachedData<Value>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", STORAGE_PREFIX, key)
    }

    fn load_durable(&self, key: &str) -> Option<CachedData<Value>> {
        let raw = match self.store.get(&Self::storage_key(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to read durable cache entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(cache = key, error = %e, "Ignoring unreadable durable cache entry");
                None
            }
        }
    }

    fn remove_durable(&self, key: &str) {
        if let Err(e) = self.store.remove(&Self::storage_key(key)) {
            debug!(cache = key, error = %e, "Failed to remove durable cache entry");
        }
    }

    fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(cache = key, error = %e, "Cached data has unexpected shape");
                None
            }
        }
    }

    /// Data for `key` if it is younger than the TTL.
    ///
    /// A durable entry found expired is deleted. An expired in-process entry
    /// is kept so `get_stale` can still serve it this session.
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let memory_hit = self
            .memory()
            .get(key)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.data.clone());
        if let Some(value) = memory_hit {
            return Self::decode(key, value);
        }

        let entry = self.load_durable(key)?;
        if entry.is_stale() {
            debug!(cache = key, age = %entry.age_display(), "Evicting expired durable entry");
            self.remove_durable(key);
            return None;
        }

        let value = entry.data.clone();
        self.memory().insert(key.to_string(), entry);
        Self::decode(key, value)
    }

    /// Data for `key` regardless of age. Never evicts.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let memory_hit = self.memory().get(key).map(|entry| entry.data.clone());
        if let Some(value) = memory_hit {
            return Self::decode(key, value);
        }

        let entry = self.load_durable(key)?;
        let value = entry.data.clone();
        self.memory().insert(key.to_string(), entry);
        Self::decode(key, value)
    }

    /// Store `data` in both tiers, timestamped now.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = key, error = %e, "Failed to serialize data for cache");
                return;
            }
        };

        let entry = CachedData::new(value);
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&Self::storage_key(key), &raw) {
                    debug!(cache = key, error = %e, "Durable cache write failed, keeping in memory only");
                }
            }
            Err(e) => debug!(cache = key, error = %e, "Failed to encode cache entry"),
        }
        self.memory().insert(key.to_string(), entry);
    }

    /// Remove one key, or every cache entry when `key` is `None`.
    /// Durable keys outside the cache prefix are left alone.
    pub fn invalidate(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.memory().remove(key);
                self.remove_durable(key);
            }
            None => {
                self.memory().clear();
                let keys = match self.store.keys() {
                    Ok(keys) => keys,
                    Err(e) => {
                        debug!(error = %e, "Failed to list durable cache entries");
                        return;
                    }
                };
                for storage_key in keys.iter().filter(|k| k.starts_with(STORAGE_PREFIX)) {
                    if let Err(e) = self.store.remove(storage_key) {
                        debug!(key = %storage_key, error = %e, "Failed to remove durable cache entry");
                    }
                }
            }
        }
    }

    /// How long ago `key` was cached, for display.
    pub fn age_of(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.memory().get(key) {
            return Some(entry.age_display());
        }
        self.load_durable(key).map(|entry| entry.age_display())
    }

    /// Every cached key with its age and whether it is still fresh.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let mut keys: Vec<String> = self.memory().keys().cloned().collect();
        match self.store.keys() {
            Ok(stored) => keys.extend(
                stored
                    .iter()
                    .filter_map(|k| k.strip_prefix(STORAGE_PREFIX))
                    .map(str::to_string),
            ),
            Err(e) => debug!(error = %e, "Failed to list durable cache entries"),
        }
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter_map(|key| {
                let memory_entry = self
                    .memory()
                    .get(&key)
                    .map(|e| (e.age_display(), e.is_stale()));
                let (age, stale) = memory_entry
                    .or_else(|| self.load_durable(&key).map(|e| (e.age_display(), e.is_stale())))?;
                Some(CacheEntryInfo { key, age, stale })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: String,
    pub age: String,
    pub stale: bool,
}

// ============================================================================
// Tests
// ============================================================================
