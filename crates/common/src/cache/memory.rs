//! Clock-driven in-memory expiring cache

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use parking_lot::RwLock;

use super::stats::{CacheStats, MetricsCollector};
use super::{Expiration, ExpiringCache};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expiration: Expiration,
    /// `None` when the window runs past what `Instant` can represent.
    deadline: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Unbounded expiring cache backed by a `HashMap`.
///
/// Expired entries are dropped lazily on `get` and in bulk by
/// [`MemoryCache::purge_expired`]. All time reads go through `C`, so a
/// [`MockClock`](crate::time::MockClock) makes expiry fully deterministic.
pub struct MemoryCache<V, C = SystemClock>
where
    C: Clock,
{
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    metrics: MetricsCollector,
    clock: C,
}

impl<V> MemoryCache<V, SystemClock> {
    /// Create a cache that reads the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<V> Default for MemoryCache<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: Clock> MemoryCache<V, C> {
    /// Create a cache with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: RwLock::new(HashMap::new()), metrics: MetricsCollector::new(), clock }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        self.metrics.record_expirations(purged as u64);
        if purged > 0 {
            tracing::debug!(purged, remaining = entries.len(), "purged expired cache entries");
        }
        purged
    }
}

impl<V, C> ExpiringCache<V> for MemoryCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn set(&self, key: &str, value: V, expiration: Expiration) {
        let deadline = self.clock.now().checked_add(expiration.lifetime());
        self.entries.write().insert(key.to_owned(), CacheEntry { value, expiration, deadline });
        self.metrics.record_insert();
    }

    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        // Write lock: a sliding hit moves the deadline.
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(key) else {
            self.metrics.record_miss();
            return None;
        };

        if entry.is_expired(now) {
            entries.remove(key);
            self.metrics.record_expirations(1);
            self.metrics.record_miss();
            return None;
        }

        if entry.expiration.is_sliding() {
            entry.deadline = now.checked_add(entry.expiration.lifetime());
        }
        self.metrics.record_hit();
        Some(entry.value.clone())
    }

    fn remove(&self, key: &str) {
        if self.entries.write().remove(key).is_some() {
            self.metrics.record_removals(1);
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.write();
        self.metrics.record_removals(entries.len() as u64);
        entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), None)
    }
}

impl<V, C: Clock> fmt::Debug for MemoryCache<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache").field("len", &self.entries.read().len()).finish_non_exhaustive()
    }
}
