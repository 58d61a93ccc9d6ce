//! Local cache of channel contents
//!
//! This module keeps the last known-good block list per channel so a channel
//! can be shown immediately, or served stale when the API is unavailable.
//! Entries expire after a TTL and the number of channels is bounded.

mod manager;
mod store;

pub use manager::{CacheConfig, CachedChannel, ChannelCache, Clock, SystemClock};
pub use store::{DirStore, KeyValueStore, MemoryStore};
