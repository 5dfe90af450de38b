//! Response cache with least-recently-used eviction.
//!
//! ## Features
//!
//! - **LRU Eviction**: reading an entry counts as a use
//! - **Bounded Size**: maximum entry count enforced on every write
//! - **Dump/Load**: entries serialize in recency order for server-to-client hand-off
//! - **Disabled Mode**: [`Cache::Disabled`] behaves like a permanently empty cache
//!   and never computes fingerprints

use crate::descriptor::RequestDescriptor;
use crate::environment::{Clock, SystemClock};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Default capacity of [`LruCache`]
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Metadata stored alongside a cached response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// When the response was written to the cache
    pub stored_at: DateTime<Utc>,
}

/// One serialized cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Fingerprint of the request
    pub key: Fingerprint,
    /// The cached response
    pub value: Response,
    /// Entry metadata
    pub meta: CacheMeta,
}

/// Serialized cache contents, most recently used entry first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheDump(Vec<CacheRecord>);

impl CacheDump {
    /// Build a dump from records ordered most recently used first
    #[must_use]
    pub const fn new(records: Vec<CacheRecord>) -> Self {
        Self(records)
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dump holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate records, most recently used first
    pub fn iter(&self) -> impl Iterator<Item = &CacheRecord> {
        self.0.iter()
    }

    /// Take the records
    #[must_use]
    pub fn into_records(self) -> Vec<CacheRecord> {
        self.0
    }

    /// Render as JSON for embedding into a server-rendered page
    ///
    /// # Errors
    ///
    /// Returns an error if a cached body cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a dump produced by [`to_json`](Self::to_json)
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid dump.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Storage backend for cached responses
///
/// Implementations use interior mutability: the store is shared by every
/// consumer created from one orchestration instance.
pub trait CacheStore: Send + Sync {
    /// Look up an entry, marking it as recently used
    fn get(&self, key: &Fingerprint) -> Option<Response>;

    /// Insert or replace an entry
    ///
    /// Returns the key evicted to make room, if any.
    fn set(&self, key: Fingerprint, value: Response) -> Option<Fingerprint>;

    /// Serialize all entries, most recently used first
    fn dump(&self) -> CacheDump;

    /// Merge serialized entries, preserving their relative recency
    fn load(&self, dump: CacheDump);

    /// Remove every entry
    fn clear(&self);

    /// Number of entries
    fn len(&self) -> usize;

    /// Whether the store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Response,
    stored_at: DateTime<Utc>,
    last_used: u64,
}

#[derive(Debug)]
struct LruState {
    tick: u64,
    entries: HashMap<Fingerprint, Slot>,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn insert(&mut self, key: Fingerprint, value: Response, stored_at: DateTime<Utc>, max: usize) -> Option<Fingerprint> {
        let last_used = self.next_tick();
        self.entries.insert(
            key,
            Slot {
                value,
                stored_at,
                last_used,
            },
        );

        if self.entries.len() > max {
            return self.evict_lru();
        }
        None
    }

    fn evict_lru(&mut self) -> Option<Fingerprint> {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&lru_key);
        Some(lru_key)
    }
}

/// In-memory LRU cache bounded by entry count
pub struct LruCache {
    max_entries: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<LruState>,
}

impl LruCache {
    /// Create a cache holding at most `max_entries` responses (minimum 1)
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Create a cache that stamps entries using `clock`
    #[must_use]
    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_entries: max_entries.max(1),
            clock,
            state: Mutex::new(LruState {
                tick: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Maximum number of entries
    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LruCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl fmt::Debug for LruCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_entries", &self.max_entries)
            .field("len", &self.len())
            .finish()
    }
}

impl CacheStore for LruCache {
    fn get(&self, key: &Fingerprint) -> Option<Response> {
        let mut state = self.lock();
        let tick = state.next_tick();
        let slot = state.entries.get_mut(key)?;
        slot.last_used = tick;
        Some(slot.value.clone())
    }

    fn set(&self, key: Fingerprint, value: Response) -> Option<Fingerprint> {
        let stored_at = self.clock.now();
        self.lock()
            .insert(key, value.into_cacheable(), stored_at, self.max_entries)
    }

    fn dump(&self) -> CacheDump {
        let state = self.lock();
        let mut slots: Vec<(&Fingerprint, &Slot)> = state.entries.iter().collect();
        slots.sort_by(|a, b| b.1.last_used.cmp(&a.1.last_used));

        CacheDump(
            slots
                .into_iter()
                .map(|(key, slot)| CacheRecord {
                    key: key.clone(),
                    value: slot.value.clone(),
                    meta: CacheMeta {
                        stored_at: slot.stored_at,
                    },
                })
                .collect(),
        )
    }

    fn load(&self, dump: CacheDump) {
        let mut state = self.lock();
        // Oldest first, so the dump's most recent entry ends up most recent here.
        for record in dump.0.into_iter().rev() {
            state.insert(
                record.key,
                record.value.into_cacheable(),
                record.meta.stored_at,
                self.max_entries,
            );
        }
    }

    fn clear(&self) {
        self.lock().entries.clear();
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

/// The cache binding of an orchestration instance
#[derive(Clone)]
pub enum Cache {
    /// Caching turned off: every lookup misses and writes are dropped
    Disabled,
    /// Caching through a shared store
    Enabled(Arc<dyn CacheStore>),
}

impl Cache {
    /// An enabled cache backed by a fresh [`LruCache`]
    #[must_use]
    pub fn lru(max_entries: usize) -> Self {
        Self::Enabled(Arc::new(LruCache::new(max_entries)))
    }

    /// An enabled cache backed by `store`
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::Enabled(store)
    }

    /// Whether caching is enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// Look up the cached response for `descriptor`
    #[must_use]
    pub fn lookup(&self, descriptor: &RequestDescriptor) -> Option<Response> {
        match self {
            Self::Disabled => None,
            Self::Enabled(store) => store.get(&fingerprint(descriptor)),
        }
    }

    /// Write `response` under the fingerprint of `descriptor`
    ///
    /// Returns the evicted key, if the write overflowed the store.
    pub fn store(&self, descriptor: &RequestDescriptor, response: Response) -> Option<Fingerprint> {
        match self {
            Self::Disabled => None,
            Self::Enabled(store) => store.set(fingerprint(descriptor), response.into_cacheable()),
        }
    }

    /// Serialize the cache contents
    #[must_use]
    pub fn dump(&self) -> CacheDump {
        match self {
            Self::Disabled => CacheDump::default(),
            Self::Enabled(store) => store.dump(),
        }
    }

    /// Merge serialized contents into the cache
    pub fn load(&self, dump: CacheDump) {
        if let Self::Enabled(store) = self {
            store.load(dump);
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        if let Self::Enabled(store) = self {
            store.clear();
        }
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::Enabled(store) => store.len(),
        }
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::lru(DEFAULT_MAX_ENTRIES)
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Cache::Disabled"),
            Self::Enabled(store) => f
                .debug_struct("Cache::Enabled")
                .field("len", &store.len())
                .finish(),
        }
    }
}
