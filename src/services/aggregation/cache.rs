//! TTL-bounded LRU cache of town profiles.

use crate::models::{Town, TownProfile};
use lru::LruCache;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Profiles for every town with transactions.
pub type ProfileMap = BTreeMap<Town, TownProfile>;

/// Cache key: one town or the all-town map, per recency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKey {
    /// A single town's profile.
    Town(Town, u32),
    /// The all-town map.
    All(u32),
}

/// Cached value.
#[derive(Debug, Clone)]
pub enum CachedProfiles {
    /// A single town's profile.
    Town(Arc<TownProfile>),
    /// The all-town map.
    All(Arc<ProfileMap>),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedProfiles,
    stored_at: Instant,
}

/// Memoizes aggregation results.
///
/// Entries expire after `ttl`; there is no other invalidation, so a fresh
/// import becomes visible once the entries covering it age out.
#[derive(Debug)]
pub struct ProfileCache {
    entries: Mutex<LruCache<ProfileKey, CacheEntry>>,
    ttl: Duration,
}

impl ProfileCache {
    /// Creates a cache. A zero `capacity` is raised to 1.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns a live entry, dropping it if it has expired.
    pub fn get(&self, key: &ProfileKey) -> Option<CachedProfiles> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            },
            None => None,
        };
        drop(entries);

        if hit.is_some() {
            metrics::counter!("profile_cache_hits_total").increment(1);
        } else {
            metrics::counter!("profile_cache_misses_total").increment(1);
        }
        hit
    }

    /// Returns a live entry without touching recency order.
    ///
    /// Only hits are counted; an absent or expired entry is left for
    /// [`Self::get`] to account for.
    pub fn peek(&self, key: &ProfileKey) -> Option<CachedProfiles> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = entries
            .peek(key)
            .filter(|entry| entry.stored_at.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone());
        drop(entries);

        if hit.is_some() {
            metrics::counter!("profile_cache_hits_total").increment(1);
        }
        hit
    }

    /// Stores a value.
    pub fn put(&self, key: ProfileKey, value: CachedProfiles) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("profile_cache_size").set(entries.len() as f64);
    }

    /// Number of entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
