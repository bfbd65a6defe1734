//! Data source resolution: live push buffer or cached pull fallback.
//!
//! [`DataSource::resolve`] takes a store [`Selection`] and turns it into a
//! [`Resource`], fetching through the [`ResponseCache`] when the selection
//! points at the fallback path. Errors never escape as `Err`; they travel in
//! `Resource::error` next to whatever data is available.
//!
//! Also here: [`ScopeTracker`] for discarding results of fetches issued for
//! a scope the user has since left, and [`Debouncer`] for delayed lookups
//! that must be cancelled on reschedule or teardown.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::FetchError;
use crate::api::{ApiClient, CacheTtls, Endpoint, Payload};
use crate::cache::{Cached, FetchOptions, ResponseCache};
use crate::store::{Scope, Selection};

/// Where a resource's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Push-fed store buffer
    Live,
    /// Pull fetch through the cache
    Fallback,
}

/// View-facing result of a load.
///
/// A failed load with a stale cache entry yields `data` *and* `error`, with
/// `stale` set. A failed load without any entry yields only `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub stale: bool,
    pub origin: DataOrigin,
}

impl<T> Resource<T> {
    pub fn live(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            stale: false,
            origin: DataOrigin::Live,
        }
    }

    fn from_cache(result: Result<Cached<T>, FetchError>) -> Self {
        match result {
            Ok(cached) => Self {
                data: Some(cached.value),
                error: cached.error,
                stale: cached.stale,
                origin: DataOrigin::Fallback,
            },
            Err(err) => Self {
                data: None,
                error: Some(err.to_string()),
                stale: false,
                origin: DataOrigin::Fallback,
            },
        }
    }

    /// Whether the view should offer a retry action.
    pub fn can_retry(&self) -> bool {
        self.origin == DataOrigin::Fallback && self.error.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        Resource {
            data: self.data.map(f),
            error: self.error,
            stale: self.stale,
            origin: self.origin,
        }
    }

    /// Like [`map`](Self::map), dropping data the projection rejects.
    pub fn filter_map<U>(self, f: impl FnOnce(T) -> Option<U>) -> Resource<U> {
        Resource {
            data: self.data.and_then(f),
            error: self.error,
            stale: self.stale,
            origin: self.origin,
        }
    }
}

/// Pull client plus shared response cache.
#[derive(Clone)]
pub struct DataSource {
    api: ApiClient,
    cache: ResponseCache<Payload>,
    ttls: CacheTtls,
}

impl DataSource {
    pub fn new(api: ApiClient, ttls: CacheTtls) -> Self {
        Self {
            api,
            cache: ResponseCache::new(),
            ttls,
        }
    }

    pub fn cache(&self) -> &ResponseCache<Payload> {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Fetch an endpoint through the cache with its class TTL.
    pub async fn fetch(&self, endpoint: &Endpoint) -> Result<Cached<Payload>, FetchError> {
        let key = endpoint.path();
        let ttl = self.ttls.for_class(endpoint.ttl_class());
        let api = self.api.clone();
        let target = endpoint.clone();
        self.cache
            .fetch(
                &key,
                move || async move { api.load(&target).await },
                FetchOptions::new(ttl),
            )
            .await
    }

    /// Turn a store selection into data.
    pub async fn resolve(&self, selection: Selection) -> Resource<Payload> {
        match selection {
            Selection::Live(payload) => Resource::live(payload),
            Selection::Fallback { cache_key, endpoint } => {
                let resource = Resource::from_cache(self.fetch(&endpoint).await);
                if let Some(error) = &resource.error {
                    warn!(key = %cache_key, %error, stale = resource.stale, "fallback load failed");
                }
                resource
            }
        }
    }

    /// Load `scope` again even if its cached value is still fresh. A failed
    /// reload serves the previous value as stale.
    pub async fn retry(&self, scope: &Scope) -> Resource<Payload> {
        let endpoint = scope.endpoint();
        self.cache.expire(&endpoint.path());
        Resource::from_cache(self.fetch(&endpoint).await)
    }

    /// Fetch the rig catalog.
    pub async fn rigs(&self) -> Resource<Payload> {
        Resource::from_cache(self.fetch(&Endpoint::Rigs).await)
    }

    /// Fetch agent lists for several rigs in parallel.
    ///
    /// Results come back in the order of `rigs`; each rig's fetch succeeds
    /// or fails on its own.
    pub async fn agents_for_rigs(&self, rigs: &[String]) -> Vec<(String, Resource<Payload>)> {
        let fetches = rigs.iter().map(|rig| {
            let endpoint = Endpoint::Agents { rig: rig.clone() };
            async move {
                let resource = Resource::from_cache(self.fetch(&endpoint).await);
                (rig.clone(), resource)
            }
        });
        join_all(fetches).await
    }
}

/// Ticket for a fetch issued under a particular scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTicket<S> {
    pub scope: S,
    generation: u64,
}

/// Tracks the currently selected scope so that late results for a previous
/// scope can be discarded. The underlying request is not aborted.
#[derive(Debug, Clone)]
pub struct ScopeTracker<S> {
    current: Option<S>,
    generation: u64,
}

impl<S> Default for ScopeTracker<S> {
    fn default() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }
}

impl<S: Clone + PartialEq + std::fmt::Debug> ScopeTracker<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&S> {
        self.current.as_ref()
    }

    /// Switch to `scope`. Tickets issued before the switch become stale.
    /// Switching to the scope that is already current changes nothing.
    pub fn switch(&mut self, scope: S) {
        if self.current.as_ref() != Some(&scope) {
            self.current = Some(scope);
            self.generation += 1;
        }
    }

    /// Issue a ticket for a fetch under the current scope.
    pub fn ticket(&self) -> Option<ScopeTicket<S>> {
        self.current.as_ref().map(|scope| ScopeTicket {
            scope: scope.clone(),
            generation: self.generation,
        })
    }

    pub fn is_current(&self, ticket: &ScopeTicket<S>) -> bool {
        ticket.generation == self.generation && self.current.as_ref() == Some(&ticket.scope)
    }

    /// Return `value` if `ticket` is still current, otherwise drop it.
    pub fn accept<T>(&self, ticket: &ScopeTicket<S>, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!(scope = ?ticket.scope, "discarding result for previous scope");
            None
        }
    }
}

/// Runs a task after a delay, cancelling any previously scheduled task.
/// Dropping the debouncer cancels the pending task.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after `delay`. Must be called inside a tokio
    /// runtime.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
