//! Bounded, time-expiring cache of channel contents
//!
//! Provides a `ChannelCache` that keeps the last known-good block list per
//! channel. Entries expire after a TTL and the number of channels kept is
//! bounded; the oldest entries by store time are evicted first.
//!
//! The cache is an optimization, never a source of truth: every storage or
//! serialization failure is logged and turned into a no-op or a miss.

use std::fmt;
use std::io;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::store::{DirStore, KeyValueStore, MemoryStore};
use crate::data::Block;

/// Cache tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace prepended to every channel id
    pub key_prefix: String,
    /// How long an entry stays valid
    pub ttl: Duration,
    /// Maximum number of channels kept
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "arena_cache_".to_string(),
            ttl: Duration::hours(24),
            max_entries: 50,
        }
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Persisted form of an entry: `{ "timestamp": <epoch millis>, "blocks": [...] }`
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<B> {
    timestamp: i64,
    blocks: B,
}

/// Only the timestamp, for ordering entries during eviction
#[derive(Debug, Deserialize)]
struct StoredTimestamp {
    timestamp: i64,
}

/// A cache hit with its store time
#[derive(Debug, Clone, PartialEq)]
pub struct CachedChannel {
    pub items: Vec<Block>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
enum CacheError {
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded TTL cache mapping a channel id to its blocks
#[derive(Clone)]
pub struct ChannelCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl fmt::Debug for ChannelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChannelCache {
    /// Creates a cache in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined.
    pub fn new() -> Option<Self> {
        DirStore::new().map(|store| Self::with_store(Arc::new(store)))
    }

    /// Creates a cache that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Creates a cache over any key-value backend
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: CacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn key(&self, channel_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, channel_id)
    }

    /// Stores `items` for a channel, evicting the oldest channels over the bound
    ///
    /// Failures are logged and otherwise ignored.
    pub fn put(&self, channel_id: &str, items: &[Block]) {
        if self.config.max_entries == 0 {
            return;
        }
        match self.try_put(channel_id, items) {
            Ok(()) => debug!(channel = channel_id, items = items.len(), "cached channel"),
            Err(e) => warn!(channel = channel_id, error = %e, "failed to cache channel"),
        }
    }

    fn try_put(&self, channel_id: &str, items: &[Block]) -> Result<(), CacheError> {
        let key = self.key(channel_id);
        let entry = StoredEntry {
            timestamp: self.clock.now().timestamp_millis(),
            blocks: items,
        };
        let json = serde_json::to_string(&entry)?;
        self.store.set(&key, &json)?;
        self.evict_oldest(&key)?;
        Ok(())
    }

    /// Returns the cached items for a channel if present and fresh
    pub fn get(&self, channel_id: &str) -> Option<Vec<Block>> {
        self.get_entry(channel_id).map(|entry| entry.items)
    }

    /// Like [`get`](Self::get), also reporting when the entry was stored
    ///
    /// Stale or unreadable entries are removed and reported as a miss.
    pub fn get_entry(&self, channel_id: &str) -> Option<CachedChannel> {
        let key = self.key(channel_id);
        let raw = match self.store.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(channel = channel_id, error = %e, "failed to read cache");
                return None;
            }
        };

        let entry: StoredEntry<Vec<Block>> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(channel = channel_id, error = %e, "discarding unreadable cache entry");
                self.remove_quietly(&key);
                return None;
            }
        };

        let Some(stored_at) = DateTime::<Utc>::from_timestamp_millis(entry.timestamp) else {
            self.remove_quietly(&key);
            return None;
        };

        if self.clock.now() - stored_at > self.config.ttl {
            debug!(channel = channel_id, "cache entry expired");
            self.remove_quietly(&key);
            return None;
        }

        Some(CachedChannel {
            items: entry.blocks,
            stored_at,
        })
    }

    /// Removes all but the `max_entries` most recently stored channels
    ///
    /// `keep` is the entry just written; it always survives. Unreadable
    /// entries count as the oldest.
    fn evict_oldest(&self, keep: &str) -> Result<(), CacheError> {
        let mut others: Vec<(i64, String)> = self
            .namespaced_keys()?
            .into_iter()
            .filter(|key| key != keep)
            .map(|key| {
                let timestamp = self
                    .store
                    .get(&key)
                    .ok()
                    .flatten()
                    .and_then(|raw| serde_json::from_str::<StoredTimestamp>(&raw).ok())
                    .map_or(i64::MIN, |entry| entry.timestamp);
                (timestamp, key)
            })
            .collect();

        let room = self.config.max_entries.saturating_sub(1);
        if others.len() <= room {
            return Ok(());
        }

        // Newest first; everything past `room` goes
        others.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, key) in others.drain(room..) {
            debug!(key = %key, "evicting cache entry");
            self.store.remove(&key)?;
        }
        Ok(())
    }

    /// Removes every entry under this cache's namespace
    pub fn clear(&self) {
        let keys = match self.namespaced_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list cache entries");
                return;
            }
        };
        for key in keys {
            self.remove_quietly(&key);
        }
    }

    /// Number of entries under this cache's namespace, fresh or not
    pub fn len(&self) -> usize {
        self.namespaced_keys().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespaced_keys(&self) -> io::Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(&self.config.key_prefix))
            .collect())
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "failed to remove cache entry");
        }
    }
}
