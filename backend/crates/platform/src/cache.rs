//! Cache Service
//!
//! String-keyed cache with per-entry TTL and pattern eviction.
//!
//! An entry expires at `min(absolute deadline, last access + 5 min)`; the
//! absolute deadline is the caller's TTL or [`DEFAULT_TTL`]. Values are
//! stored as JSON text. Reads never fail: a miss and an undecodable entry
//! both come back as `None`.
//!
//! The tracked-key index used by [`CacheService::remove_by_pattern`] is
//! pruned from the eviction listener and may briefly disagree with the
//! cache itself. Treat pattern eviction as best effort.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use regex::RegexBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Absolute lifetime when the caller does not pass one
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Idle window layered on top of the absolute lifetime
pub const SLIDING_TTL: Duration = Duration::from_secs(5 * 60);

/// Injected cache abstraction
#[async_trait]
pub trait CacheService: Send + Sync + 'static {
    async fn get_raw(&self, key: &str) -> Option<String>;

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>);

    async fn remove(&self, key: &str);

    /// Evict every tracked key matching `pattern` (case-insensitive regex)
    ///
    /// Returns the number of keys evicted. An invalid pattern evicts nothing.
    async fn remove_by_pattern(&self, pattern: &str) -> usize;
}

/// Typed access; values travel as JSON text
impl dyn CacheService {
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Cached value could not be decoded");
                None
            }
        }
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl).await,
            Err(e) => tracing::error!(key, error = %e, "Value could not be serialized for cache"),
        }
    }
}

// ============================================================================
// In-process implementation
// ============================================================================

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub default_ttl: Duration,
    pub sliding_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl: DEFAULT_TTL,
            sliding_ttl: SLIDING_TTL,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    payload: Arc<str>,
    deadline: Instant,
}

struct EntryExpiry {
    sliding: Duration,
}

impl EntryExpiry {
    fn remaining(&self, entry: &Entry, now: Instant) -> Duration {
        entry.deadline.saturating_duration_since(now).min(self.sliding)
    }
}

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, created_at: Instant) -> Option<Duration> {
        Some(self.remaining(value, created_at))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &Entry,
        read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(self.remaining(value, read_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value, updated_at))
    }
}

/// `moka`-backed process-local cache
///
/// Not shared between replicas: each instance of the API has its own.
#[derive(Clone)]
pub struct MemoryCacheService {
    cache: Cache<String, Entry>,
    tracked: Arc<DashMap<String, ()>>,
    default_ttl: Duration,
}

impl MemoryCacheService {
    pub fn new(config: CacheConfig) -> Self {
        let tracked: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());
        let index = tracked.clone();

        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry {
                sliding: config.sliding_ttl,
            })
            .eviction_listener(move |key: Arc<String>, _value: Entry, cause: RemovalCause| {
                if cause != RemovalCause::Replaced {
                    index.remove(key.as_str());
                }
            })
            .build();

        Self {
            cache,
            tracked,
            default_ttl: config.default_ttl,
        }
    }

    /// Number of keys currently tracked for pattern eviction
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }
}

impl Default for MemoryCacheService {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl CacheService for MemoryCacheService {
    async fn get_raw(&self, key: &str) -> Option<String> {
        self.cache.get(key).await.map(|entry| entry.payload.to_string())
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = Entry {
            payload: Arc::from(value),
            deadline: Instant::now() + ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        self.tracked.insert(key.to_string(), ());
    }

    async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await;
        self.tracked.remove(key);
    }

    async fn remove_by_pattern(&self, pattern: &str) -> usize {
        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                tracing::error!(pattern, error = %e, "Invalid cache eviction pattern");
                return 0;
            }
        };

        let matching: Vec<String> = self
            .tracked
            .iter()
            .filter(|entry| regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &matching {
            self.remove(key).await;
        }

        tracing::debug!(pattern, evicted = matching.len(), "Cache entries evicted by pattern");
        matching.len()
    }
}
