//! Expiring caches keyed by string
//!
//! One abstraction, [`ExpiringCache`], with two interchangeable backends:
//!
//! - **[`MemoryCache`]**: `parking_lot::RwLock<HashMap>` driven by an
//!   injectable [`Clock`](crate::time::Clock), so expiry is deterministic
//!   under [`MockClock`](crate::time::MockClock)
//! - **[`MokaCache`]**: `moka::sync::Cache` with a per-entry expiry policy and
//!   bounded capacity
//!
//! Every entry carries its own [`Expiration`]:
//!
//! - **Sliding**: the window restarts on every successful read
//! - **Absolute**: the entry dies a fixed duration after insertion, reads or
//!   not
//!
//! [`ExpiringCache::set_default`] uses a sliding window of
//! [`DEFAULT_SLIDING_WINDOW`] (three hours).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use keystore_common::cache::{Expiration, ExpiringCache, MemoryCache};
//! use keystore_common::time::MockClock;
//!
//! let clock = MockClock::new();
//! let cache: MemoryCache<u32, MockClock> = MemoryCache::with_clock(clock.clone());
//!
//! cache.set("answer", 42, Expiration::Absolute(Duration::from_secs(10)));
//! assert_eq!(cache.get("answer"), Some(42));
//!
//! clock.advance(Duration::from_secs(11));
//! assert_eq!(cache.get("answer"), None);
//! ```
//!
//! # Thread Safety
//!
//! Both backends are `Send + Sync` and are meant to be shared behind an
//! `Arc<dyn ExpiringCache<V>>`. There is no coherence between processes.

mod memory;
mod moka_cache;
mod stats;

use std::time::Duration;

pub use memory::MemoryCache;
pub use moka_cache::{MokaCache, DEFAULT_MAX_CAPACITY};
pub use stats::CacheStats;

/// Sliding window applied by [`ExpiringCache::set_default`].
pub const DEFAULT_SLIDING_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// Longest lifetime a backend schedules for one entry; longer windows are
/// clamped to it.
pub const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Expiration policy attached to a single cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// Expires after the window elapses without a read.
    Sliding(Duration),
    /// Expires a fixed duration after insertion.
    Absolute(Duration),
}

impl Expiration {
    /// The window (sliding) or time-to-live (absolute).
    pub const fn duration(self) -> Duration {
        match self {
            Self::Sliding(window) => window,
            Self::Absolute(ttl) => ttl,
        }
    }

    /// [`Self::duration`] clamped to [`MAX_ENTRY_LIFETIME`].
    pub fn lifetime(self) -> Duration {
        self.duration().min(MAX_ENTRY_LIFETIME)
    }

    /// Whether reads extend the entry's lifetime.
    pub const fn is_sliding(self) -> bool {
        matches!(self, Self::Sliding(_))
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Self::Sliding(DEFAULT_SLIDING_WINDOW)
    }
}

/// String-keyed cache with per-entry expiration.
///
/// Implementations must be safe for concurrent readers and writers. A `get`
/// never returns an entry whose expiration has passed.
pub trait ExpiringCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Insert or replace `key` with the given expiration policy.
    fn set(&self, key: &str, value: V, expiration: Expiration);

    /// Fetch a live entry, refreshing its window if it is sliding.
    fn get(&self, key: &str) -> Option<V>;

    /// Remove `key` immediately. Missing keys are ignored.
    fn remove(&self, key: &str);

    /// Remove every entry.
    fn clear(&self);

    /// Number of entries currently held (may include not-yet-purged expired
    /// entries).
    fn len(&self) -> usize;

    /// Snapshot of hit/miss/insert counters.
    fn stats(&self) -> CacheStats;

    /// Insert with the default sliding window.
    fn set_default(&self, key: &str, value: V) {
        self.set(key, value, Expiration::default());
    }

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
