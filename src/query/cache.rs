//! Keyed query cache with live subscriptions.
//!
//! Each [`QueryCache`] holds the results of one operation (one [`Namespace`]),
//! keyed by that operation's parameters. Consumers hold a [`Subscription`]
//! per key; the cache pushes [`SubscriptionState`] transitions onto the
//! subscription's channel whenever the entry it observes changes.
//!
//! Fetches run as spawned tasks. Each carries a generation number so that a
//! result overtaken by a newer fetch for the same key (after an invalidation)
//! is dropped instead of overwriting fresher data.

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::namespace::Namespace;
use super::state::SubscriptionState;
use crate::api::ApiError;

/// Bounds for anything usable as a cache key.
pub trait CacheKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}
impl<T> CacheKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Bounds for anything storable as a cached value.
pub trait CacheValue: Send + Sync + 'static {}
impl<T> CacheValue for T where T: Send + Sync + 'static {}

type Fetcher<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync>;

/// Default number of entries kept per namespace.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => unreachable!(),
};

/// Tuning shared by every namespace of a client.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How long a successful result counts as fresh. Zero means every new
    /// subscription to a cached key shows the cached data as a placeholder
    /// and refetches.
    pub stale_time: Duration,
    /// Maximum entries kept per namespace; least recently used are evicted.
    pub capacity: NonZeroUsize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

// ============================================================================
// Internal State
// ============================================================================

struct Entry<V> {
    data: Option<Arc<V>>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Generation of the fetch currently allowed to complete this entry.
    in_flight: Option<u64>,
}

impl<V> Entry<V> {
    fn empty() -> Self {
        Self {
            data: None,
            updated_at: None,
            invalidated: false,
            in_flight: None,
        }
    }

    fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|at| now.duration_since(at) < stale_time)
    }
}

struct Subscriber<K, V> {
    key: K,
    tx: mpsc::UnboundedSender<SubscriptionState<V>>,
    /// Most recent data delivered; shown as placeholder after a key change.
    last_data: Option<Arc<V>>,
}

impl<K, V> Subscriber<K, V> {
    fn send(&mut self, state: SubscriptionState<V>) {
        if let Some(data) = state.data() {
            self.last_data = Some(Arc::clone(data));
        }
        // Receiver lives as long as the Subscription, which unregisters on drop
        let _ = self.tx.send(state);
    }
}

struct CacheState<K: CacheKey, V> {
    entries: LruCache<K, Entry<V>>,
    subscribers: HashMap<u64, Subscriber<K, V>>,
    next_subscriber: u64,
    next_generation: u64,
}

impl<K: CacheKey, V> CacheState<K, V> {
    fn bump_generation(next_generation: &mut u64) -> u64 {
        *next_generation = next_generation.wrapping_add(1);
        *next_generation
    }
}

struct CacheInner<K: CacheKey, V> {
    namespace: Namespace,
    fetcher: Fetcher<K, V>,
    stale_time: Duration,
    state: Mutex<CacheState<K, V>>,
}

impl<K: CacheKey, V: CacheValue> CacheInner<K, V> {
    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver the current state to subscriber `id`, starting a fetch if the
    /// entry for its key is missing or stale and nothing is in flight.
    fn observe(self: &Arc<Self>, state: &mut CacheState<K, V>, id: u64) {
        let now = Instant::now();
        let CacheState {
            entries,
            subscribers,
            next_generation,
            ..
        } = state;
        let Some(subscriber) = subscribers.get_mut(&id) else {
            return;
        };

        let entry = entries.get_or_insert_mut(subscriber.key.clone(), Entry::empty);
        let next = match &entry.data {
            Some(data) if entry.is_fresh(self.stale_time, now) => {
                SubscriptionState::Settled(Arc::clone(data))
            }
            Some(data) => SubscriptionState::PlaceholderServing(Arc::clone(data)),
            None => match &subscriber.last_data {
                Some(previous) => SubscriptionState::PlaceholderServing(Arc::clone(previous)),
                None => SubscriptionState::Pending,
            },
        };

        if !next.is_settled() && entry.in_flight.is_none() {
            let generation = CacheState::<K, V>::bump_generation(next_generation);
            entry.in_flight = Some(generation);
            self.spawn_fetch(subscriber.key.clone(), generation);
        }

        tracing::trace!(
            namespace = %self.namespace,
            key = ?subscriber.key,
            state = next.label(),
            "Delivering subscription state"
        );
        subscriber.send(next);
    }

    fn spawn_fetch(self: &Arc<Self>, key: K, generation: u64) {
        tracing::debug!(namespace = %self.namespace, key = ?key, generation, "Fetching");
        let fetch = (self.fetcher)(key.clone());
        let cache: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(fetch)
                .catch_unwind()
                .await
                .map_err(|panic| panic_message(&*panic));
            // Cache dropped while the fetch ran: nobody left to notify
            if let Some(cache) = cache.upgrade() {
                cache.complete(key, generation, outcome);
            }
        });
    }

    fn complete(&self, key: K, generation: u64, outcome: Result<Result<V, ApiError>, String>) {
        let mut guard = self.lock();
        let CacheState {
            entries,
            subscribers,
            ..
        } = &mut *guard;

        if !entries.contains(&key) {
            // Evicted mid-flight; only worth keeping if someone is watching
            if !subscribers.values().any(|s| s.key == key) {
                tracing::debug!(namespace = %self.namespace, key = ?key, "Dropping result for evicted entry");
                return;
            }
            let mut entry = Entry::empty();
            entry.in_flight = Some(generation);
            entries.put(key.clone(), entry);
        }
        let Some(entry) = entries.get_mut(&key) else {
            return;
        };

        if entry.in_flight != Some(generation) {
            tracing::debug!(
                namespace = %self.namespace,
                key = ?key,
                generation,
                current = ?entry.in_flight,
                "Discarding superseded fetch result"
            );
            return;
        }
        entry.in_flight = None;

        let data = match outcome {
            Ok(Ok(value)) => {
                let data = Arc::new(value);
                entry.data = Some(Arc::clone(&data));
                entry.updated_at = Some(Instant::now());
                entry.invalidated = false;
                tracing::debug!(namespace = %self.namespace, key = ?key, generation, "Fetch settled");
                data
            }
            Ok(Err(e)) => {
                tracing::warn!(namespace = %self.namespace, key = ?key, error = %e, "Fetch failed");
                match &entry.data {
                    Some(data) => Arc::clone(data),
                    None => return,
                }
            }
            Err(panic) => {
                tracing::error!(namespace = %self.namespace, key = ?key, error = %panic, "Fetch task panicked");
                match &entry.data {
                    Some(data) => Arc::clone(data),
                    None => return,
                }
            }
        };

        for subscriber in subscribers.values_mut().filter(|s| s.key == key) {
            subscriber.send(SubscriptionState::Settled(Arc::clone(&data)));
        }
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Cache for one namespace. Cloning shares the same entries.
pub struct QueryCache<K: CacheKey, V: CacheValue> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K: CacheKey, V: CacheValue> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: CacheKey, V: CacheValue> QueryCache<K, V> {
    pub fn new<F>(namespace: Namespace, fetcher: F, options: CacheOptions) -> Self
    where
        F: Fn(K) -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync + 'static,
    {
        let state = CacheState {
            entries: LruCache::new(options.capacity),
            subscribers: HashMap::new(),
            next_subscriber: 0,
            next_generation: 0,
        };
        Self {
            inner: Arc::new(CacheInner {
                namespace,
                fetcher: Arc::new(fetcher),
                stale_time: options.stale_time,
                state: Mutex::new(state),
            }),
        }
    }

    /// Start observing `key`.
    ///
    /// The first state is queued before this returns, so
    /// [`Subscription::try_next`] yields it immediately. Must be called from
    /// within a Tokio runtime: fetches are spawned onto it.
    pub fn subscribe(&self, key: K) -> Subscription<K, V> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.inner.lock();
        let id = guard.next_subscriber;
        guard.next_subscriber += 1;
        guard.subscribers.insert(
            id,
            Subscriber {
                key: key.clone(),
                tx,
                last_data: None,
            },
        );
        self.inner.observe(&mut guard, id);
        drop(guard);

        Subscription {
            id,
            key,
            rx,
            cache: Arc::clone(&self.inner),
        }
    }

    /// Mark every entry stale and refetch the ones somebody is observing.
    ///
    /// Returns without waiting; observers see `PlaceholderServing` now and
    /// `Settled` once their refetch completes. A refetch supersedes any fetch
    /// already in flight for the same key.
    pub fn invalidate_all(&self) {
        let mut guard = self.inner.lock();
        let CacheState {
            entries,
            subscribers,
            next_generation,
            ..
        } = &mut *guard;

        for (_, entry) in entries.iter_mut() {
            entry.invalidated = true;
        }

        let observed: HashSet<K> = subscribers.values().map(|s| s.key.clone()).collect();
        for key in &observed {
            let generation = CacheState::<K, V>::bump_generation(next_generation);
            let entry = entries.get_or_insert_mut(key.clone(), Entry::empty);
            entry.invalidated = true;
            entry.in_flight = Some(generation);
            let cached = entry.data.clone();
            self.inner.spawn_fetch(key.clone(), generation);

            for subscriber in subscribers.values_mut().filter(|s| &s.key == key) {
                // No data anywhere means the subscriber is still Pending
                if let Some(shown) = cached.clone().or_else(|| subscriber.last_data.clone()) {
                    subscriber.send(SubscriptionState::PlaceholderServing(shown));
                }
            }
        }

        tracing::debug!(
            namespace = %self.inner.namespace,
            entries = entries.len(),
            refetching = observed.len(),
            "Invalidated namespace"
        );
    }

    /// Cached data for `key`, fresh or not, without touching recency.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner
            .lock()
            .entries
            .peek(key)
            .and_then(|entry| entry.data.clone())
    }

    /// True while a fetch for `key` is in flight.
    pub fn is_fetching(&self, key: &K) -> bool {
        self.inner
            .lock()
            .entries
            .peek(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Live handle on one key of a [`QueryCache`].
///
/// States arrive in the order the cache produced them. Dropping the handle
/// unregisters it; nothing is delivered afterwards.
pub struct Subscription<K: CacheKey, V: CacheValue> {
    id: u64,
    key: K,
    rx: mpsc::UnboundedReceiver<SubscriptionState<V>>,
    cache: Arc<CacheInner<K, V>>,
}

impl<K: CacheKey, V: CacheValue> Subscription<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Switch to observing `key`. Returns false (and does nothing) when
    /// `key` equals the current key.
    ///
    /// States still queued for the previous key are discarded.
    pub fn set_key(&mut self, key: K) -> bool {
        if key == self.key {
            return false;
        }
        let mut guard = self.cache.lock();
        while self.rx.try_recv().is_ok() {}
        if let Some(subscriber) = guard.subscribers.get_mut(&self.id) {
            subscriber.key = key.clone();
        }
        self.key = key;
        self.cache.observe(&mut guard, self.id);
        true
    }

    /// Wait for the next state. Cancel-safe.
    pub async fn next(&mut self) -> Option<SubscriptionState<V>> {
        self.rx.recv().await
    }

    /// Next queued state, if any, without waiting.
    pub fn try_next(&mut self) -> Option<SubscriptionState<V>> {
        self.rx.try_recv().ok()
    }
}

impl<K: CacheKey, V: CacheValue> Drop for Subscription<K, V> {
    fn drop(&mut self) {
        self.cache.lock().subscribers.remove(&self.id);
        tracing::trace!(namespace = %self.cache.namespace, key = ?self.key, "Unsubscribed");
    }
}

impl<K: CacheKey + Unpin, V: CacheValue> Stream for Subscription<K, V> {
    type Item = SubscriptionState<V>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Fetcher that returns `key * 10`, counting calls.
    fn counting_cache(options: CacheOptions) -> (QueryCache<u32, u32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = QueryCache::new(
            Namespace::GetBookmarks,
            move |key: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(key * 10) }.boxed()
            },
            options,
        );
        (cache, calls)
    }

    /// Fetcher that blocks until `gate` is notified.
    fn gated_cache() -> (QueryCache<u32, u32>, Arc<Notify>, Arc<AtomicUsize>) {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch_gate = Arc::clone(&gate);
        let counter = Arc::clone(&calls);
        let cache = QueryCache::new(
            Namespace::GetBookmarks,
            move |key: u32| {
                let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
                let gate = Arc::clone(&fetch_gate);
                async move {
                    gate.notified().await;
                    Ok(key * 10 + n)
                }
                .boxed()
            },
            CacheOptions::default(),
        );
        (cache, gate, calls)
    }

    fn settled(state: Option<SubscriptionState<u32>>) -> u32 {
        match state {
            Some(SubscriptionState::Settled(data)) => *data,
            other => panic!("expected settled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_subscribe_is_pending_then_settled() {
        let (cache, calls) = counting_cache(CacheOptions::default());
        let mut sub = cache.subscribe(1);

        assert!(sub.try_next().unwrap().is_pending());
        assert_eq!(settled(sub.next().await), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let (cache, gate, calls) = gated_cache();
        let mut a = cache.subscribe(1);
        let mut b = cache.subscribe(1);
        assert!(a.try_next().unwrap().is_pending());
        assert!(b.try_next().unwrap().is_pending());
        assert!(cache.is_fetching(&1));

        gate.notify_one();
        assert_eq!(settled(a.next().await), 10);
        assert_eq!(settled(b.next().await), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_entry_settles_without_fetch() {
        let (cache, calls) = counting_cache(CacheOptions {
            stale_time: Duration::from_secs(60),
            ..CacheOptions::default()
        });
        let mut first = cache.subscribe(2);
        first.try_next();
        settled(first.next().await);

        let mut second = cache.subscribe(2);
        assert_eq!(settled(second.try_next()), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_served_as_placeholder() {
        let (cache, calls) = counting_cache(CacheOptions::default());
        let mut first = cache.subscribe(3);
        first.try_next();
        settled(first.next().await);
        drop(first);

        let mut second = cache.subscribe(3);
        let state = second.try_next().unwrap();
        assert!(state.is_placeholder_data());
        assert_eq!(state.data().map(|d| **d), Some(30));
        assert_eq!(settled(second.next().await), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_key_change_keeps_previous_data_as_placeholder() {
        let (cache, _calls) = counting_cache(CacheOptions::default());
        let mut sub = cache.subscribe(1);
        sub.try_next();
        settled(sub.next().await);

        assert!(sub.set_key(2));
        let state = sub.try_next().unwrap();
        assert!(state.is_placeholder_data());
        assert_eq!(state.data().map(|d| **d), Some(10));
        assert_eq!(settled(sub.next().await), 20);
    }

    #[tokio::test]
    async fn test_set_same_key_is_noop() {
        let (cache, calls) = counting_cache(CacheOptions::default());
        let mut sub = cache.subscribe(1);
        sub.try_next();
        settled(sub.next().await);

        assert!(!sub.set_key(1));
        assert!(sub.try_next().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_refetches_observed_keys_only() {
        let (cache, calls) = counting_cache(CacheOptions::default());
        let mut watched = cache.subscribe(1);
        watched.try_next();
        settled(watched.next().await);
        {
            let mut other = cache.subscribe(2);
            other.try_next();
            settled(other.next().await);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate_all();
        assert!(watched.try_next().unwrap().is_placeholder_data());
        assert_eq!(settled(watched.next().await), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_supersedes_in_flight_fetch() {
        let (cache, gate, calls) = gated_cache();
        let mut sub = cache.subscribe(1);
        assert!(sub.try_next().unwrap().is_pending());

        // Second fetch replaces the first; no data yet so no placeholder is sent
        cache.invalidate_all();
        assert!(sub.try_next().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Let both fetch tasks park on the gate before releasing them together
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        gate.notify_waiters();
        // Only the second fetch (n = 1) may settle the entry
        assert_eq!(settled(sub.next().await), 11);
        tokio::task::yield_now().await;
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_pending() {
        let cache: QueryCache<u32, u32> = QueryCache::new(
            Namespace::GetBookmark,
            |_key: u32| async { Err(ApiError::HttpStatus(500)) }.boxed(),
            CacheOptions::default(),
        );
        let mut sub = cache.subscribe(1);
        assert!(sub.try_next().unwrap().is_pending());

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(sub.try_next().is_none());
        assert!(!cache.is_fetching(&1));
        assert!(cache.peek(&1).is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_unregisters() {
        let (cache, gate, _calls) = gated_cache();
        let sub = cache.subscribe(1);
        assert_eq!(cache.subscriber_count(), 1);
        drop(sub);
        assert_eq!(cache.subscriber_count(), 0);

        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // Result is still cached for the next subscriber
        assert_eq!(cache.peek(&1).map(|d| *d), Some(10));
    }

    #[tokio::test]
    async fn test_lru_evicts_unobserved_entries() {
        let (cache, _calls) = counting_cache(CacheOptions {
            stale_time: Duration::ZERO,
            capacity: NonZeroUsize::new(2).unwrap(),
        });
        for key in 1..=3 {
            let mut sub = cache.subscribe(key);
            sub.try_next();
            settled(sub.next().await);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&1).is_none());
        assert!(cache.peek(&3).is_some());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }
}
