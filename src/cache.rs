//! Request memoization with per-key TTL and stale-serving.
//!
//! [`ResponseCache`] wraps any async loader. A fresh entry is returned
//! without touching the loader; a missing or stale entry triggers exactly
//! one load per key even when several callers ask at once (the callers share
//! the in-flight future). When a load fails and the caller opted in, the
//! previous value is served with its error attached instead of failing.
//!
//! Time is read from `tokio::time::Instant` so tests can drive expiry with a
//! paused clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::FetchError;

/// Options for a single [`ResponseCache::fetch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// How long a successful result stays fresh
    pub ttl: Duration,
    /// Serve the previous value (marked stale) when the loader fails
    pub return_stale_on_error: bool,
}

impl FetchOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            return_stale_on_error: true,
        }
    }

    pub fn stale_on_error(mut self, enabled: bool) -> Self {
        self.return_stale_on_error = enabled;
        self
    }
}

/// Value returned from the cache, with staleness and any load error.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    /// True when the value is past its TTL
    pub stale: bool,
    /// Error from the load that failed while this value was served
    pub error: Option<String>,
}

impl<V> Cached<V> {
    fn fresh(value: V) -> Self {
        Self {
            value,
            stale: false,
            error: None,
        }
    }
}

/// Metadata about a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub ttl: Duration,
    pub expires_at: Instant,
    pub stale: bool,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    ttl: Duration,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_stale(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, FetchError>>>;

struct InFlight<V> {
    load_id: u64,
    future: SharedLoad<V>,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, InFlight<V>>,
    next_load_id: u64,
}

/// Keyed async cache. Cloning yields another handle to the same storage.
pub struct ResponseCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn lock<V>(inner: &Mutex<Inner<V>>) -> MutexGuard<'_, Inner<V>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_load_id: 0,
            })),
        }
    }

    /// Return the value for `key`, loading it if missing or stale.
    ///
    /// Concurrent calls for the same key while a load is pending await that
    /// load instead of starting their own; the result is stored once, with
    /// the TTL of the call that started the load. Loader failures are never
    /// retried here.
    ///
    /// `loader` is invoked on first poll of the load, after the cache lock
    /// has been released, so it may use this cache.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        loader: F,
        options: FetchOptions,
    ) -> Result<Cached<V>, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let load = {
            let mut inner = lock(&self.inner);
            if let Some(entry) = inner.entries.get(key) {
                if !entry.is_stale(Instant::now()) {
                    debug!(key, "cache hit");
                    return Ok(Cached::fresh(entry.value.clone()));
                }
            }

            match inner.in_flight.get(key) {
                Some(pending) => {
                    debug!(key, "joining in-flight load");
                    pending.future.clone()
                }
                None => {
                    debug!(key, "cache miss, loading");
                    let load_id = inner.next_load_id;
                    inner.next_load_id += 1;
                    let future = self.start_load(
                        key.to_string(),
                        load_id,
                        async move { loader().await },
                        options.ttl,
                    );
                    inner.in_flight.insert(
                        key.to_string(),
                        InFlight {
                            load_id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        match load.await {
            Ok(value) => Ok(Cached::fresh(value)),
            Err(err) => {
                if options.return_stale_on_error {
                    let inner = lock(&self.inner);
                    if let Some(entry) = inner.entries.get(key) {
                        warn!(key, error = %err, "load failed, serving stale value");
                        return Ok(Cached {
                            value: entry.value.clone(),
                            stale: true,
                            error: Some(err.to_string()),
                        });
                    }
                }
                Err(err)
            }
        }
    }

    /// Wrap `loader` so that its completion writes the cache exactly once,
    /// whichever caller happens to drive it.
    fn start_load<Fut>(&self, key: String, load_id: u64, loader: Fut, ttl: Duration) -> SharedLoad<V>
    where
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = loader.await;
            let mut guard = lock(&inner);
            if guard
                .in_flight
                .get(&key)
                .is_some_and(|pending| pending.load_id == load_id)
            {
                guard.in_flight.remove(&key);
            }
            if let Ok(value) = &result {
                guard.entries.insert(
                    key,
                    CacheEntry {
                        value: value.clone(),
                        ttl,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Current value for `key` without loading, if any.
    pub fn peek(&self, key: &str) -> Option<Cached<V>> {
        let inner = lock(&self.inner);
        let now = Instant::now();
        inner.entries.get(key).map(|entry| Cached {
            value: entry.value.clone(),
            stale: entry.is_stale(now),
            error: None,
        })
    }

    pub fn entry_info(&self, key: &str) -> Option<CacheEntryInfo> {
        let inner = lock(&self.inner);
        let now = Instant::now();
        inner.entries.get(key).map(|entry| CacheEntryInfo {
            ttl: entry.ttl,
            expires_at: entry.expires_at,
            stale: entry.is_stale(now),
        })
    }

    /// Whether a load for `key` is currently pending.
    pub fn is_loading(&self, key: &str) -> bool {
        lock(&self.inner).in_flight.contains_key(key)
    }

    /// Mark the value for `key` stale without dropping it, so the next
    /// fetch reloads but can still fall back to it.
    pub fn expire(&self, key: &str) -> bool {
        let mut inner = lock(&self.inner);
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Drop the stored value for `key`. A pending load is left alone.
    pub fn invalidate(&self, key: &str) -> bool {
        lock(&self.inner).entries.remove(key).is_some()
    }

    /// Drop every stored value whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        lock(&self.inner).entries.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, FetchError>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            }
            .boxed()
        }
    }

    fn failing_loader(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, FetchError>> + use<> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Transport("connection refused".to_string()))
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_within_ttl_loads_once() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_millis(1000));

        let first = cache.fetch("/api/rigs", counting_loader(&calls, "a"), opts).await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        let second = cache.fetch("/api/rigs", counting_loader(&calls, "b"), opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.value, "a");
        assert_eq!(second.value, "a");
        assert!(!second.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_after_ttl_reloads() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_millis(1000));

        cache.fetch("k", counting_loader(&calls, "a"), opts).await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        let again = cache.fetch("k", counting_loader(&calls, "b"), opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(again.value, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_served_on_error() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_millis(100));

        cache.fetch("k", counting_loader(&calls, "cached"), opts).await.unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        let result = cache.fetch("k", failing_loader(&calls), opts).await.unwrap();

        assert_eq!(result.value, "cached");
        assert!(result.stale);
        assert_eq!(
            result.error.as_deref(),
            Some("Network error: connection refused")
        );
        // The stale entry survives for the next attempt
        assert!(cache.peek("k").unwrap().stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_propagates_without_stale_opt_in() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_millis(100));

        cache.fetch("k", counting_loader(&calls, "cached"), opts).await.unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        let result = cache
            .fetch("k", failing_loader(&calls), opts.stale_on_error(false))
            .await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_previous_entry() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = cache
            .fetch("k", failing_loader(&calls), FetchOptions::new(Duration::from_secs(5)))
            .await;
        assert!(result.is_err());
        assert!(cache.peek("k").is_none());
        assert!(!cache.is_loading("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_coalesce() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_secs(5));

        let slow = |calls: Arc<AtomicUsize>| {
            move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, FetchError>("agents".to_string())
                }
                .boxed()
            }
        };

        let (a, b, c) = tokio::join!(
            cache.fetch("/api/rigs/a/agents", slow(Arc::clone(&calls)), opts),
            cache.fetch("/api/rigs/a/agents", slow(Arc::clone(&calls)), opts),
            cache.fetch("/api/rigs/a/agents", slow(Arc::clone(&calls)), opts),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().value, "agents");
        assert_eq!(b.unwrap().value, "agents");
        assert_eq!(c.unwrap().value, "agents");
        assert!(!cache.is_loading("/api/rigs/a/agents"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_callers_share_stale_fallback() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_millis(100));

        cache.fetch("/api/rigs", counting_loader(&calls, "cached"), opts).await.unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;

        let slow_failure = |calls: Arc<AtomicUsize>| {
            move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err::<String, _>(FetchError::Transport("connection reset".to_string()))
                }
                .boxed()
            }
        };
        let (a, b, c) = tokio::join!(
            cache.fetch("/api/rigs", slow_failure(Arc::clone(&calls)), opts),
            cache.fetch("/api/rigs", slow_failure(Arc::clone(&calls)), opts),
            cache.fetch("/api/rigs", slow_failure(Arc::clone(&calls)), opts.stale_on_error(false)),
        );

        // Initial load plus one shared reload
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        for served in [a.unwrap(), b.unwrap()] {
            assert_eq!(served.value, "cached");
            assert!(served.stale);
            assert_eq!(served.error.as_deref(), Some("Network error: connection reset"));
        }
        assert!(matches!(c, Err(FetchError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_keeps_value_for_stale_fallback() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_secs(60));

        cache.fetch("k", counting_loader(&calls, "cached"), opts).await.unwrap();
        assert!(cache.expire("k"));
        assert!(!cache.expire("missing"));
        assert!(cache.peek("k").unwrap().stale);

        let served = cache.fetch("k", failing_loader(&calls), opts).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(served.value, "cached");
        assert!(served.stale);
        assert!(served.error.is_some());
    }

    #[tokio::test]
    async fn test_loader_may_use_cache() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let handle = cache.clone();
        let result = cache
            .fetch(
                "k",
                move || {
                    let loading = handle.is_loading("k");
                    let stored = handle.len();
                    async move { Ok(format!("{} {}", loading, stored)) }
                },
                FetchOptions::new(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(result.value, "true 0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_load_independently() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_secs(5));

        let (a, b) = tokio::join!(
            cache.fetch("a", counting_loader(&calls, "1"), opts),
            cache.fetch("b", counting_loader(&calls, "2"), opts),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.unwrap().value, "1");
        assert_eq!(b.unwrap().value, "2");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_reload() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = FetchOptions::new(Duration::from_secs(60));

        cache.fetch("/api/rigs/a/issues", counting_loader(&calls, "x"), opts).await.unwrap();
        cache.fetch("/api/rigs/a/agents", counting_loader(&calls, "y"), opts).await.unwrap();
        cache.fetch("/api/mail", counting_loader(&calls, "z"), opts).await.unwrap();

        assert!(cache.invalidate("/api/mail"));
        assert!(!cache.invalidate("/api/mail"));
        assert_eq!(cache.invalidate_prefix("/api/rigs/a/"), 2);
        assert!(cache.is_empty());

        cache.fetch("/api/mail", counting_loader(&calls, "z2"), opts).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_info_reports_ttl() {
        let cache: ResponseCache<String> = ResponseCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(5);
        let start = Instant::now();

        cache.fetch("k", counting_loader(&calls, "v"), FetchOptions::new(ttl)).await.unwrap();
        let info = cache.entry_info("k").unwrap();
        assert_eq!(info.ttl, ttl);
        assert_eq!(info.expires_at, start + ttl);
        assert!(!info.stale);

        tokio::time::advance(ttl).await;
        assert!(cache.entry_info("k").unwrap().stale);
    }
}
