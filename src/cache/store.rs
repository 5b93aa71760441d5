// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache-Aside Store
//!
//! Generic get-or-compute primitive with TTL, single-flight miss handling
//! and pattern invalidation.
//!
//! # Flow
//!
//! ```text
//! get_or_compute(key, ttl, producer)
//!       │
//!       ├─→ live entry? ──────────────→ return it (producer not called)
//!       │
//!       ├─→ flight in progress? ──────→ await leader's value
//!       │                                (leader failed → try again)
//!       │
//!       └─→ become leader
//!                │
//!                ├─→ run producer once
//!                ├─→ store entry, unless the flight was invalidated meanwhile
//!                └─→ publish value to waiters
//! ```
//!
//! # Invalidation vs in-flight writes
//!
//! Each flight is registered in `inflight` under its key with a unique id.
//! The leader writes its entry while holding a read guard on that
//! registration, and only if the registration still carries its id.
//! [`CacheAside::invalidate_matching`] removes registrations before removing
//! entries, so a flight that started before the invalidation can never store
//! its (possibly stale) result after it.
//!
//! # Eviction order
//!
//! Every stored entry carries the id of the flight that wrote it, and the
//! eviction queue records `(key, id)`. A queue item whose id no longer
//! matches the live entry is stale (the key expired, was invalidated or was
//! rewritten) and is skipped. Stale items are compacted away once the queue
//! exceeds twice the capacity.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::pattern::KeyPattern;
use crate::metrics;

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    /// Id of the flight that stored this value
    seq: u64,
}

/// Registration of the computation currently producing a key
struct Flight<V> {
    id: u64,
    rx: watch::Receiver<Option<V>>,
}

/// Held by the leader of a flight. Dropping it (success, error or
/// cancellation) unregisters the flight and closes the channel, which wakes
/// any waiters.
struct FlightGuard<'a, V: Clone + Send + Sync + 'static> {
    cache: &'a CacheAside<V>,
    key: String,
    id: u64,
    tx: watch::Sender<Option<V>>,
}

impl<V: Clone + Send + Sync + 'static> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        let id = self.id;
        self.cache.inflight.remove_if(&self.key, |_, flight| flight.id == id);
    }
}

enum Claim<'a, V: Clone + Send + Sync + 'static> {
    Lead(FlightGuard<'a, V>),
    Wait(watch::Receiver<Option<V>>),
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of live-entry hits
    pub hits: u64,
    /// Number of producer invocations
    pub misses: u64,
    /// Entries found past their TTL
    pub expired: u64,
    /// Callers that joined another caller's computation
    pub coalesced: u64,
    /// Entries removed by invalidation
    pub invalidated: u64,
    /// Current number of entries
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

/// Concurrent cache-aside store
pub struct CacheAside<V: Clone + Send + Sync + 'static> {
    entries: DashMap<String, CacheEntry<V>>,
    inflight: DashMap<String, Flight<V>>,
    /// Insertion order for eviction (oldest first), tagged with entry seq
    order: Mutex<VecDeque<(String, u64)>>,
    max_entries: usize,
    enabled: bool,
    next_flight: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    coalesced: AtomicU64,
    invalidated: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> CacheAside<V> {
    /// Create a cache holding at most `max_entries` live entries
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            enabled: true,
            next_flight: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything: every call runs its producer.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(0)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.max_entries > 0
    }

    /// Live value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.lookup(key);
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("hit");
        }
        value
    }

    /// Return the live entry for `key`, or run `producer` and cache its `Ok`
    /// value for `ttl`.
    ///
    /// Concurrent misses on the same key collapse into one producer call;
    /// the other callers receive the leader's value. Errors are not cached:
    /// they go to the leader's caller, and waiters retry (one of them becomes
    /// the next leader).
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, ttl: Duration, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !self.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("bypass");
            return producer().await;
        }

        loop {
            if let Some(value) = self.get(key) {
                trace!(key = %key, "Cache hit");
                return Ok(value);
            }

            match self.claim(key) {
                Claim::Lead(flight) => return self.lead(key, ttl, flight, producer).await,
                Claim::Wait(rx) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_lookup("coalesced");
                    if let Some(value) = Self::await_flight(rx).await {
                        return Ok(value);
                    }
                    debug!(key = %key, "In-flight computation abandoned, retrying");
                }
            }
        }
    }

    /// Remove one key. Absence is not an error.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inflight.remove(key);
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.invalidated.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove every entry (and in-flight computation) whose key matches
    /// `pattern`. See [`KeyPattern`] for matching rules. Returns the number
    /// of entries removed; zero matches is a silent no-op.
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        let pattern = KeyPattern::new(pattern);

        // Flights first: a leader that lost its registration will not store
        self.inflight.retain(|key, _| !pattern.matches(key));

        let mut removed = 0usize;
        self.entries.retain(|key, _| {
            let keep = !pattern.matches(key);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.invalidated.fetch_add(removed as u64, Ordering::Relaxed);
        }
        metrics::record_cache_invalidation(removed);
        debug!(pattern = %pattern.as_str(), removed, "Cache invalidated");
        removed
    }

    /// Drop entries past their TTL. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0usize;
        self.entries.retain(|_, entry| {
            let live = entry.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        if purged > 0 {
            self.expired.fetch_add(purged as u64, Ordering::Relaxed);
            self.compact_order(&mut self.order.lock());
        }
        purged
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.inflight.clear();
        self.entries.clear();
        self.order.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let entry_count = self.entries.len();
        metrics::set_cache_entries(entry_count);

        CacheStats {
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            entry_count,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internal helpers
    // ═══════════════════════════════════════════════════════════════════════

    /// Live value without touching hit counters; expired entries are dropped.
    fn lookup(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
            drop(entry); // Release read lock before removing
            if self.entries.remove_if(key, |_, e| e.expires_at <= now).is_some() {
                self.expired.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("expired");
            }
        }
        None
    }

    fn claim(&self, key: &str) -> Claim<'_, V> {
        match self.inflight.entry(key.to_string()) {
            MapEntry::Occupied(flight) => Claim::Wait(flight.get().rx.clone()),
            MapEntry::Vacant(slot) => {
                let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Flight { id, rx });
                Claim::Lead(FlightGuard {
                    cache: self,
                    key: key.to_string(),
                    id,
                    tx,
                })
            }
        }
    }

    async fn lead<F, Fut, E>(&self, key: &str, ttl: Duration, flight: FlightGuard<'_, V>, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // A previous leader may have stored between our lookup and our claim
        if let Some(value) = self.lookup(key) {
            flight.tx.send_replace(Some(value.clone()));
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup("miss");

        let value = producer().await?;

        if !self.store_if_current(key, ttl, flight.id, value.clone()) {
            debug!(key = %key, "Computation invalidated while in flight, result not cached");
        }
        flight.tx.send_replace(Some(value.clone()));
        Ok(value)
    }

    async fn await_flight(mut rx: watch::Receiver<Option<V>>) -> Option<V> {
        match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }

    fn store_if_current(&self, key: &str, ttl: Duration, flight_id: u64, value: V) -> bool {
        let Some(flight) = self.inflight.get(key) else {
            return false;
        };
        if flight.id != flight_id {
            return false;
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                seq: flight_id,
            },
        );
        drop(flight);

        let mut order = self.order.lock();
        order.push_back((key.to_string(), flight_id));
        // Evict oldest if over capacity
        while self.entries.len() > self.max_entries {
            match order.pop_front() {
                Some((old_key, seq)) => {
                    self.entries.remove_if(&old_key, |_, entry| entry.seq == seq);
                }
                None => break,
            }
        }
        if order.len() > self.max_entries.saturating_mul(2) {
            self.compact_order(&mut order);
        }
        true
    }

    /// Drop queue items that no longer point at a live entry
    fn compact_order(&self, order: &mut VecDeque<(String, u64)>) {
        order.retain(|(key, seq)| self.entries.get(key).is_some_and(|entry| entry.seq == *seq));
    }
}

impl<V: Clone + Send + Sync + 'static> Default for CacheAside<V> {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn ok(value: &str) -> Result<String, String> {
        Ok(value.to_string())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache: CacheAside<String> = CacheAside::new(100);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ok("v")
                })
                .await
                .unwrap();
            assert_eq!(value, "v");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_never_a_hit() {
        let cache: CacheAside<String> = CacheAside::new(100);
        cache
            .get_or_compute("k", Duration::from_secs(10), || async { ok("old") })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").as_deref(), Some("old"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k"), None);

        let value = cache
            .get_or_compute("k", Duration::from_secs(10), || async { ok("new") })
            .await
            .unwrap();
        assert_eq!(value, "new");
        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: CacheAside<String> = CacheAside::new(100);
        let result: Result<String, String> = cache
            .get_or_compute("k", Duration::from_secs(60), || async { Err("down".to_string()) })
            .await;
        assert_eq!(result, Err("down".to_string()));
        assert!(cache.is_empty());

        let value = cache
            .get_or_compute("k", Duration::from_secs(60), || async { ok("up") })
            .await
            .unwrap();
        assert_eq!(value, "up");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_run_producer_once() {
        let cache: Arc<CacheAside<String>> = Arc::new(CacheAside::new(100));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..32 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("hot", Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ok("computed")
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "computed");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_retry_after_leader_error() {
        let cache: Arc<CacheAside<String>> = Arc::new(CacheAside::new(100));
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("k", Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<String, String>("boom".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("k", Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ok("recovered")
                    })
                    .await
            })
        };

        assert_eq!(leader.await.unwrap(), Err("boom".to_string()));
        assert_eq!(waiter.await.unwrap(), Ok("recovered".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_matching_leaves_unrelated_keys() {
        let cache: CacheAside<String> = CacheAside::new(100);
        for key in ["product_42_page_1", "smiles_product_42_all", "product_142_page_1", "catalog_msk_x"] {
            cache
                .get_or_compute(key, Duration::from_secs(60), || async { ok(key) })
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate_matching("product_42_*"), 2);
        assert!(cache.get("product_42_page_1").is_none());
        assert!(cache.get("smiles_product_42_all").is_none());
        assert!(cache.get("product_142_page_1").is_some());
        assert!(cache.get("catalog_msk_x").is_some());

        // No match is a silent no-op
        assert_eq!(cache.invalidate_matching("nothing_*"), 0);
        assert_eq!(cache.stats().invalidated, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalidation_during_flight_is_not_resurrected() {
        let cache: Arc<CacheAside<String>> = Arc::new(CacheAside::new(100));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("product_7_reviews", Duration::from_secs(60), || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        ok("stale")
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate_matching("product_7_*");
        release_tx.send(()).unwrap();

        // The leader's caller still gets its value...
        assert_eq!(leader.await.unwrap(), Ok("stale".to_string()));
        // ...but it was not written back
        assert!(cache.get("product_7_reviews").is_none());

        let fresh = cache
            .get_or_compute("product_7_reviews", Duration::from_secs(60), || async { ok("fresh") })
            .await
            .unwrap();
        assert_eq!(fresh, "fresh");
    }

    #[tokio::test]
    async fn test_eviction_oldest() {
        let cache: CacheAside<String> = CacheAside::new(3);
        for key in ["a", "b", "c", "d"] {
            cache
                .get_or_compute(key, Duration::from_secs(60), || async { ok(key) })
                .await
                .unwrap();
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get("a").is_none());
        assert!(cache.get("d").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_skips_expired_then_restored_key() {
        let cache: CacheAside<String> = CacheAside::new(2);
        cache.get_or_compute("a", Duration::from_secs(1), || async { ok("a") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.get_or_compute("b", Duration::from_secs(60), || async { ok("b") }).await.unwrap();
        cache.get_or_compute("a", Duration::from_secs(60), || async { ok("a2") }).await.unwrap();
        cache.get_or_compute("c", Duration::from_secs(60), || async { ok("c") }).await.unwrap();

        // "b" is the oldest live entry; the re-stored "a" survives
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("a2"));
        assert_eq!(cache.get("c").as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_queue_stays_bounded() {
        let cache: CacheAside<String> = CacheAside::new(4);
        for _ in 0..1000 {
            cache.get_or_compute("hot", Duration::from_secs(1), || async { ok("v") }).await.unwrap();
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        for i in 0..200 {
            let key = format!("k{}", i);
            cache.get_or_compute(&key, Duration::from_secs(60), || async { ok("v") }).await.unwrap();
            cache.invalidate_matching(&key);
        }

        let queued = cache.order.lock().len();
        assert!(queued <= 8, "queue len {}", queued);
        assert!(cache.len() <= 4);
    }

    #[tokio::test]
    async fn test_invalidated_key_restored_is_still_evictable() {
        let cache: CacheAside<String> = CacheAside::new(2);
        cache.get_or_compute("product_1_a", Duration::from_secs(60), || async { ok("x") }).await.unwrap();
        cache.invalidate_matching("product_1_*");
        for key in ["product_1_a", "b", "c", "d"] {
            cache.get_or_compute(key, Duration::from_secs(60), || async { ok(key) }).await.unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get("product_1_a").is_none());
        assert!(cache.get("d").is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache: CacheAside<String> = CacheAside::disabled();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_compute("k", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ok("v")
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache: CacheAside<String> = CacheAside::new(100);
        cache.get_or_compute("short", Duration::from_secs(1), || async { ok("s") }).await.unwrap();
        cache.get_or_compute("long", Duration::from_secs(100), || async { ok("l") }).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_single_key() {
        let cache: CacheAside<String> = CacheAside::new(100);
        cache.get_or_compute("k", Duration::from_secs(60), || async { ok("v") }).await.unwrap();
        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert!(cache.is_empty());
    }
}
