//! Bounded expiring cache backed by `moka`

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::notification::RemovalCause;
use moka::sync::Cache;
use moka::Expiry;

use super::stats::{CacheStats, MetricsCollector};
use super::{Expiration, ExpiringCache};

/// Default upper bound on entries held by a [`MokaCache`].
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct Slot<V> {
    value: V,
    expiration: Expiration,
}

/// Maps each slot's [`Expiration`] onto moka's per-entry timers.
struct SlotExpiry;

impl<V> Expiry<String, Slot<V>> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot<V>, _created_at: Instant) -> Option<Duration> {
        Some(slot.expiration.lifetime())
    }

    fn expire_after_read(
        &self,
        _key: &String,
        slot: &Slot<V>,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match slot.expiration {
            Expiration::Sliding(_) => Some(slot.expiration.lifetime()),
            Expiration::Absolute(_) => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.expiration.lifetime())
    }
}

/// Expiring cache with bounded capacity.
///
/// Uses moka's internal clock, so expiry tests against this backend need real
/// (short) durations.
pub struct MokaCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Slot<V>>,
    metrics: MetricsCollector,
    max_capacity: u64,
}

impl<V> MokaCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let metrics = MetricsCollector::new();
        let listener_metrics = metrics.clone();

        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SlotExpiry)
            .eviction_listener(move |key: Arc<String>, _slot: Slot<V>, cause: RemovalCause| {
                match cause {
                    RemovalCause::Expired => listener_metrics.record_expirations(1),
                    RemovalCause::Size => tracing::trace!(key = %key, "evicted at capacity"),
                    RemovalCause::Explicit | RemovalCause::Replaced => {}
                }
            })
            .build();

        Self { inner, metrics, max_capacity }
    }

    /// Flush moka's pending maintenance so `len` and expirations are exact.
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }
}

impl<V> Default for MokaCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CAPACITY)
    }
}

impl<V> ExpiringCache<V> for MokaCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, expiration: Expiration) {
        self.inner.insert(key.to_owned(), Slot { value, expiration });
        self.metrics.record_insert();
    }

    fn get(&self, key: &str) -> Option<V> {
        if let Some(slot) = self.inner.get(key) {
            self.metrics.record_hit();
            Some(slot.value)
        } else {
            self.metrics.record_miss();
            None
        }
    }

    fn remove(&self, key: &str) {
        if self.inner.remove(key).is_some() {
            self.metrics.record_removals(1);
        }
    }

    fn clear(&self) {
        self.metrics.record_removals(self.inner.entry_count());
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    #[allow(clippy::cast_possible_truncation)]
    fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), Some(self.max_capacity))
    }
}

impl<V> fmt::Debug for MokaCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaCache")
            .field("entry_count", &self.inner.entry_count())
            .field("max_capacity", &self.max_capacity)
            .finish_non_exhaustive()
    }
}
