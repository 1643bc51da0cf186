//! In-memory cache with per-entry time-to-live.
//!
//! Expired entries are dropped lazily when a read finds them, and optionally
//! by a periodic sweep task (see [`TtlCache::spawn_sweeper`]). Time comes from
//! [`tokio::time::Instant`], so tests can pause and advance the clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL reaches past the clock's range: the entry never expires.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// A thread-safe `String`-keyed cache whose entries expire after a TTL.
///
/// Clones share the same storage, so one instance can be handed to every
/// request task. All map access goes through a single mutex that is never
/// held across an `.await`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dexproxy::cache::TtlCache;
///
/// let cache = TtlCache::new(Duration::from_secs(30));
/// cache.insert("dex:200", 42);
/// assert_eq!(cache.get("dex:200"), Some(42));
/// assert_eq!(cache.get("dex:50"), None);
/// ```
#[derive(Clone)]
pub struct TtlCache<V> {
    entries: Arc<Mutex<HashMap<String, Entry<V>>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache whose [`insert`](Self::insert) uses `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Stores `value` under `key` with the default TTL, replacing any entry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.ttl);
    }

    /// Stores `value` under `key`, live until `ttl` has elapsed from now.
    ///
    /// A `ttl` too large to represent as a deadline keeps the entry forever.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Returns the value for `key` if it is still live.
    ///
    /// An expired entry found here is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning its value if it was still live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The TTL applied by [`insert`](Self::insert).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Every critical section is a single map call, so a poisoned map is intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Spawns a task that calls [`purge_expired`](Self::purge_expired) every
    /// `period`. Must be called from within a Tokio runtime.
    ///
    /// The task runs until the returned handle is aborted. A zero `period`,
    /// or one too large to schedule, yields a task that exits at once.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let Some(start) = Instant::now().checked_add(period).filter(|_| !period.is_zero())
            else {
                debug!(?period, "cache sweep disabled");
                return;
            };
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = cache.len(), "swept expired cache entries");
                }
            }
        })
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entries", &len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn entry_is_live_until_ttl_elapses() {
        let cache = TtlCache::new(TTL);
        cache.insert("dex:200", json!({ "pairs": [] }));

        time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get("dex:200"), Some(json!({ "pairs": [] })));

        time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("dex:200"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_evicts_entry() {
        let cache = TtlCache::new(TTL);
        cache.insert("dex:1", 1);
        cache.insert("dex:2", 2);

        time::advance(TTL).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("dex:1"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_uses_its_own_ttl() {
        let cache = TtlCache::new(TTL);
        cache.set("short", "a", Duration::from_secs(1));
        cache.insert("long", "b");

        time::advance(Duration::from_secs(2)).await;
        assert!(!cache.contains_key("short"));
        assert!(cache.contains_key("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_restarts_expiry() {
        let cache = TtlCache::new(TTL);
        cache.insert("dex:200", 1);
        time::advance(Duration::from_secs(20)).await;
        cache.insert("dex:200", 2);
        time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.get("dex:200"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_counts_dropped_entries() {
        let cache = TtlCache::new(TTL);
        cache.insert("a", 1);
        cache.set("b", 2, Duration::from_secs(60));
        time::advance(TTL).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_ignores_expired_values() {
        let cache = TtlCache::new(TTL);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.remove("a"), Some(1));

        time::advance(TTL).await;
        assert_eq!(cache.remove("b"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_in_background() {
        let cache = TtlCache::new(TTL);
        cache.insert("dex:200", 1);
        let sweeper = cache.spawn_sweeper(Duration::from_secs(60));

        time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_never_expires() {
        let cache = TtlCache::new(Duration::from_secs(u64::MAX));
        cache.insert("dex:200", 1);
        cache.set("dex:50", 2, Duration::MAX);

        time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("dex:200"), Some(1));
        assert_eq!(cache.get("dex:50"), Some(2));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn sweeper_with_zero_or_huge_period_exits() {
        let cache: TtlCache<u8> = TtlCache::new(TTL);
        assert!(cache.spawn_sweeper(Duration::ZERO).await.is_ok());
        assert!(cache.spawn_sweeper(Duration::from_secs(u64::MAX)).await.is_ok());
    }

    #[test]
    fn clones_share_storage() {
        let cache: TtlCache<Value> = TtlCache::new(TTL);
        let other = cache.clone();
        other.insert("dex:10", json!([1, 2]));
        assert_eq!(cache.get("dex:10"), Some(json!([1, 2])));

        cache.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let cache = TtlCache::new(TTL);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.insert(format!("dex:{t}-{i}"), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 200);
    }

    #[test]
    fn debug_format() {
        let cache = TtlCache::new(TTL);
        cache.insert("k", 1);
        let debug = format!("{cache:?}");
        assert!(debug.contains("TtlCache"));
        assert!(debug.contains("entries: 1"));
    }
}
