//! Keyed, single-flight cache with TTL freshness and stale-on-error.
//!
//! At most one fetch per key is in flight. The fetch runs on its own task so
//! a caller that stops waiting never leaves the cache half-written; every
//! concurrent caller for that key awaits the same shared outcome.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::entry::{CacheEntry, Cached, FetchPolicy};
use crate::error::{CacheError, StoreError};
use crate::retry::fetch_with_retry;
use crate::store::{Envelope, SnapshotStore};

type FetchOutcome<T> = Result<CacheEntry<T>, CacheError>;
type SharedFetch<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

struct InFlight<T> {
    generation: u64,
    future: SharedFetch<T>,
    abort: AbortHandle,
}

struct State<T> {
    entries: HashMap<String, CacheEntry<T>>,
    in_flight: HashMap<String, InFlight<T>>,
    next_generation: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
    stale_served: AtomicU64,
    cancelled: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Inner<T> {
    state: Mutex<State<T>>,
    counters: Counters,
    store: Option<Arc<dyn SnapshotStore>>,
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStatistics {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub failures: u64,
    pub stale_served: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Serve a fresh entry if there is one.
    Lookup,
    /// Always go to the network, unless a fetch is already running.
    Refresh,
}

/// Cache of `T` values keyed by string.
///
/// Cloning is cheap and clones share state.
pub struct DataCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DataCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for DataCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DataCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// An in-memory cache with no durable snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A cache that persists every successful fetch to `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn SnapshotStore>) -> Self {
        Self::build(Some(store))
    }

    fn build(store: Option<Arc<dyn SnapshotStore>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                    next_generation: 0,
                }),
                counters: Counters::default(),
                store,
            }),
        }
    }

    /// Returns the entry for `key` if it is fresh under `policy.ttl`,
    /// otherwise joins or starts a fetch.
    ///
    /// When the fetch fails and a previous value exists, that value is
    /// returned with `stale = true` instead of the error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the fetch fails (after retries) and there
    /// is nothing to fall back on.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        policy: &FetchPolicy,
        fetcher: F,
    ) -> Result<Cached<T>, CacheError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.run(key, policy, fetcher, None, Mode::Lookup).await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but stops waiting when
    /// `cancel` fires. If no other caller is waiting on the same fetch, the
    /// fetch itself is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Cancelled`] on cancellation when there is no
    /// previous value, or any error [`get_or_fetch`](Self::get_or_fetch)
    /// returns.
    pub async fn get_or_fetch_with_cancel<F, Fut, E>(
        &self,
        key: &str,
        policy: &FetchPolicy,
        fetcher: F,
        cancel: &CancellationToken,
    ) -> Result<Cached<T>, CacheError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.run(key, policy, fetcher, Some(cancel), Mode::Lookup)
            .await
    }

    /// Fetches `key` regardless of freshness. Joins a fetch that is already
    /// running instead of starting a second one.
    ///
    /// # Errors
    ///
    /// Same as [`get_or_fetch`](Self::get_or_fetch).
    pub async fn refresh<F, Fut, E>(
        &self,
        key: &str,
        policy: &FetchPolicy,
        fetcher: F,
    ) -> Result<Cached<T>, CacheError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.run(key, policy, fetcher, None, Mode::Refresh).await
    }

    async fn run<F, Fut, E>(
        &self,
        key: &str,
        policy: &FetchPolicy,
        fetcher: F,
        cancel: Option<&CancellationToken>,
        mode: Mode,
    ) -> Result<Cached<T>, CacheError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (generation, mut future) = {
            let mut state = self.inner.lock();

            if mode == Mode::Lookup {
                if let Some(entry) = state.entries.get(key) {
                    if entry.is_fresh(policy.ttl, Utc::now()) {
                        bump(&self.inner.counters.hits);
                        tracing::debug!(key, "cache hit");
                        return Ok(Cached::from_entry(entry, false, true));
                    }
                }
            }

            if let Some(flight) = state.in_flight.get(key) {
                bump(&self.inner.counters.coalesced);
                tracing::debug!(key, generation = flight.generation, "joining in-flight fetch");
                (flight.generation, flight.future.clone())
            } else {
                bump(&self.inner.counters.misses);
                self.start_fetch(&mut state, key, policy, fetcher)
            }
        };

        let outcome = match cancel {
            Some(token) => {
                let waited = tokio::select! {
                    outcome = &mut future => Some(outcome),
                    () = token.cancelled() => None,
                };
                match waited {
                    Some(outcome) => outcome,
                    None => {
                        self.abandon(key, generation, &future);
                        Err(CacheError::Cancelled {
                            key: key.to_owned(),
                        })
                    }
                }
            }
            None => future.await,
        };

        match outcome {
            Ok(entry) => Ok(Cached::from_entry(&entry, false, false)),
            Err(err) => self.fallback(key, err),
        }
    }

    fn start_fetch<F, Fut, E>(
        &self,
        state: &mut State<T>,
        key: &str,
        policy: &FetchPolicy,
        fetcher: F,
    ) -> (u64, SharedFetch<T>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let generation = state.next_generation;
        state.next_generation += 1;

        // With a previous value to fall back on, fail fast and serve it.
        let max_retries = if state.entries.contains_key(key) {
            0
        } else {
            policy.max_retries
        };

        bump(&self.inner.counters.fetches);
        tracing::debug!(key, generation, max_retries, "starting fetch");

        let inner = Arc::clone(&self.inner);
        let task_key = key.to_owned();
        let backoff = policy.retry_backoff;
        let timeout = policy.timeout;
        let task = tokio::spawn(async move {
            let result = fetch_with_retry(&task_key, max_retries, backoff, timeout, fetcher).await;
            inner.complete(&task_key, generation, result)
        });
        let abort = task.abort_handle();

        let inner = Arc::clone(&self.inner);
        let join_key = key.to_owned();
        let future = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_cancelled() => Err(CacheError::Cancelled { key: join_key }),
                Err(join_error) => {
                    inner.clear_in_flight(&join_key, generation);
                    bump(&inner.counters.failures);
                    Err(CacheError::Fetch {
                        key: join_key,
                        attempts: 1,
                        message: format!("fetch task panicked: {join_error}"),
                    })
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.to_owned(),
            InFlight {
                generation,
                future: future.clone(),
                abort,
            },
        );
        (generation, future)
    }

    /// Drops this caller's interest in a fetch. Aborts it when nobody else
    /// is waiting.
    fn abandon(&self, key: &str, generation: u64, future: &SharedFetch<T>) {
        let mut state = self.inner.lock();
        let is_current = state
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation);
        // One handle lives in the in-flight map, the other is ours.
        let sole_waiter = matches!(future.strong_count(), Some(n) if n <= 2);
        if is_current && sole_waiter {
            if let Some(flight) = state.in_flight.remove(key) {
                flight.abort.abort();
                bump(&self.inner.counters.cancelled);
                tracing::debug!(key, generation, "aborted fetch after cancellation");
            }
        }
    }

    fn fallback(&self, key: &str, err: CacheError) -> Result<Cached<T>, CacheError> {
        let state = self.inner.lock();
        match state.entries.get(key) {
            Some(entry) => {
                bump(&self.inner.counters.stale_served);
                tracing::warn!(
                    key,
                    fetched_at = %entry.fetched_at,
                    error = %err,
                    "serving stale data after fetch failure"
                );
                Ok(Cached::from_entry(entry, true, true))
            }
            None => Err(err),
        }
    }

    /// Current entry for `key` without touching the network. `stale` is set
    /// when the entry is not fresh under `ttl`.
    #[must_use]
    pub fn peek(&self, key: &str, ttl: std::time::Duration) -> Option<Cached<T>> {
        let state = self.inner.lock();
        state.entries.get(key).map(|entry| {
            let fresh = entry.is_fresh(ttl, Utc::now());
            Cached::from_entry(entry, !fresh, true)
        })
    }

    /// Marks `key` expired while keeping its value as a stale fallback.
    /// Returns whether an entry existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.inner.lock();
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    /// Forgets `key` entirely: entry, in-flight fetch and durable snapshot.
    /// Returns whether an entry existed.
    pub fn remove(&self, key: &str) -> bool {
        let existed = {
            let mut state = self.inner.lock();
            if let Some(flight) = state.in_flight.remove(key) {
                flight.abort.abort();
            }
            state.entries.remove(key).is_some()
        };
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.remove(key) {
                tracing::warn!(key, error = %e, "failed to remove snapshot");
            }
        }
        existed
    }

    /// Aborts the fetch running for `key`, if any. Waiters receive
    /// [`CacheError::Cancelled`] or the stale value.
    pub fn cancel_in_flight(&self, key: &str) -> bool {
        let flight = self.inner.lock().in_flight.remove(key);
        match flight {
            Some(flight) => {
                flight.abort.abort();
                bump(&self.inner.counters.cancelled);
                tracing::debug!(key, generation = flight.generation, "cancelled in-flight fetch");
                true
            }
            None => false,
        }
    }

    /// Loads the durable snapshot for `key` into memory, keeping its
    /// original fetch time. An entry already in memory wins.
    ///
    /// Returns `Ok(true)` if an entry was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot exists but cannot be read or
    /// does not decode as `T`.
    pub fn hydrate(&self, key: &str) -> Result<bool, StoreError> {
        let Some(store) = &self.inner.store else {
            return Ok(false);
        };
        let Some(envelope) = store.load(key)? else {
            return Ok(false);
        };

        let data: T = serde_json::from_value(envelope.data).map_err(|source| StoreError::Serialize {
            key: key.to_owned(),
            source,
        })?;
        let fetched_at = DateTime::<Utc>::from_timestamp_millis(envelope.timestamp).unwrap_or_default();

        let mut state = self.inner.lock();
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        state
            .entries
            .insert(key.to_owned(), CacheEntry::new(Arc::new(data), fetched_at));
        tracing::debug!(key, %fetched_at, "hydrated cache entry from snapshot");
        Ok(true)
    }

    #[must_use]
    pub fn statistics(&self) -> CacheStatistics {
        let (entries, in_flight) = {
            let state = self.inner.lock();
            (state.entries.len(), state.in_flight.len())
        };
        let c = &self.inner.counters;
        CacheStatistics {
            entries,
            in_flight,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Keys with a stored entry, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<T> Inner<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_in_flight(&self, key: &str, generation: u64) {
        let mut state = self.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            state.in_flight.remove(key);
        }
    }

    /// Records the outcome of fetch `generation`. A result whose fetch was
    /// cancelled or superseded is returned to its waiters but not stored.
    fn complete(&self, key: &str, generation: u64, result: Result<T, CacheError>) -> FetchOutcome<T> {
        let mut state = self.lock();
        let current = state
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation);
        if current {
            state.in_flight.remove(key);
        }

        match result {
            Ok(data) => {
                let entry = CacheEntry::new(Arc::new(data), Utc::now());
                if current {
                    state.entries.insert(key.to_owned(), entry.clone());
                }
                drop(state);
                if current {
                    tracing::debug!(key, generation, "fetch stored");
                    self.persist(key, &entry);
                } else {
                    tracing::debug!(key, generation, "discarding result of superseded fetch");
                }
                Ok(entry)
            }
            Err(err) => {
                drop(state);
                bump(&self.counters.failures);
                tracing::warn!(key, generation, error = %err, "fetch failed");
                Err(err)
            }
        }
    }

    fn persist(&self, key: &str, entry: &CacheEntry<T>) {
        let Some(store) = &self.store else {
            return;
        };
        let data = match serde_json::to_value(&*entry.data) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize snapshot");
                return;
            }
        };
        let envelope = Envelope {
            data,
            timestamp: entry.fetched_at.timestamp_millis(),
        };
        if let Err(e) = store.save(key, &envelope) {
            tracing::warn!(key, error = %e, "failed to persist snapshot");
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
