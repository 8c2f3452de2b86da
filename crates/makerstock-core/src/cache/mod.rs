//! Local caching module for read-heavy inventory queries.
//!
//! This module provides the `CacheManager`, a two-tier cache: an in-process
//! map backed by a durable key-value store. Entries are JSON `{data,
//! timestamp}` and considered stale after 60 minutes, but stay readable as
//! stale data for stale-while-revalidate views.
//!
//! Cached queries:
//! - Case names
//! - Component names per case
//! - Live stock

pub mod manager;
pub mod store;

pub use manager::{CacheEntryInfo, CacheManager, CachedData, CACHE_TTL_MINUTES, STORAGE_PREFIX};
pub use store::{DurableStore, FileStore, MemoryStore};
