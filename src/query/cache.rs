//! Keyed, shared cache of asynchronous fetches.
//!
//! Every consumer of a key sees the same entry. A key has at most one fetch
//! in flight; later callers join it instead of issuing their own request.
//! Values are stored type-erased and handed out as `Arc<T>`, so projections
//! never touch the stored value.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result};
use crate::query::key::{KeyFilter, QueryKey};
use crate::query::state::{QueryState, QueryStatus};

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(120);

type Value = Arc<dyn Any + Send + Sync>;
type Outcome = std::result::Result<Value, Error>;
type SharedFetch = Shared<BoxFuture<'static, Outcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// When false the cache neither fetches nor creates an entry.
    pub enabled: bool,
    /// Overrides the cache-wide stale time for this read.
    pub stale_time: Option<Duration>,
    /// Serve stale data immediately and refetch in the background.
    pub background_refetch: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
            background_refetch: false,
        }
    }
}

impl QueryOptions {
    pub fn enabled_if(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn with_background_refetch(mut self) -> Self {
        self.background_refetch = true;
        self
    }
}

struct Flight {
    id: u64,
    /// Entry epoch when the fetch started.
    epoch: u64,
    fetch: SharedFetch,
    cancel: CancelToken,
    waiters: usize,
}

#[derive(Default)]
struct Entry {
    status: QueryStatus,
    data: Option<Value>,
    error: Option<Error>,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    invalidated: bool,
    /// Bumped on every invalidation.
    epoch: u64,
    flight: Option<Flight>,
}

impl Entry {
    fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated || self.fetched_at.is_none_or(|at| at.elapsed() >= stale_time)
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        self.status == QueryStatus::Success && self.data.is_some() && !self.is_stale(stale_time)
    }

    fn snapshot<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
    ) -> QueryState<Arc<T>> {
        let status = match (&self.flight, &self.data) {
            (Some(_), None) => QueryStatus::Loading,
            _ => self.status,
        };
        QueryState {
            status,
            data: self.data.clone().and_then(|value| downcast(key, value)),
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_stale: self.data.is_some() && self.is_stale(stale_time),
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: Value) -> Option<Arc<T>> {
    match value.downcast::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(?key, "Cached value has an unexpected type");
            None
        }
    }
}

#[derive(Default)]
struct Entries {
    map: HashMap<QueryKey, Entry>,
    next_flight: u64,
}

/// Releases a waiter's interest in a flight unless it saw the result.
struct Waiter<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    flight_id: u64,
    settled: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.leave(self.key, self.flight_id);
        }
    }
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<Entries>>,
    stale_time: Duration,
    fetches: Arc<AtomicUsize>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            stale_time,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached value for `key`, fetching it when missing or stale.
    ///
    /// `fetcher` is only invoked when this call starts a new flight, on the
    /// flight's first poll and never under the cache lock. It gets the
    /// flight's own token, which fires once every waiter has cancelled. If
    /// `cancel` fires first this call returns a discarded state and writes
    /// nothing on its behalf.
    pub async fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        cancel: &CancelToken,
        fetcher: F,
    ) -> QueryState<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let stale_time = options.stale_time.unwrap_or(self.stale_time);
        if !options.enabled {
            return self.peek_with(&key, stale_time);
        }
        if cancel.is_cancelled() {
            return QueryState::discarded();
        }

        let (fetch, flight_id) = {
            let mut guard = self.lock();
            let entries = &mut *guard;
            let entry = entries.map.entry(key.clone()).or_default();
            let serve_stale = options.background_refetch && entry.data.is_some();

            if entry.flight.is_some() && serve_stale {
                return entry.snapshot(&key, stale_time);
            }
            if let Some(flight) = entry.flight.as_mut() {
                debug!(?key, "Joining in-flight fetch");
                flight.waiters += 1;
                (flight.fetch.clone(), flight.id)
            } else if entry.is_fresh(stale_time) {
                debug!(?key, "Cache HIT");
                return entry.snapshot(&key, stale_time);
            } else {
                entries.next_flight += 1;
                let id = entries.next_flight;
                let token = CancelToken::new();
                let flight_token = token.clone();
                let fetch = async move {
                    fetcher(flight_token)
                        .await
                        .map(|value| Arc::new(value) as Value)
                }
                .boxed()
                .shared();
                entry.flight = Some(Flight {
                    id,
                    epoch: entry.epoch,
                    fetch: fetch.clone(),
                    cancel: token,
                    waiters: 1,
                });
                self.fetches.fetch_add(1, Ordering::SeqCst);

                if serve_stale {
                    debug!(?key, "Serving stale data while revalidating");
                    let snapshot = entry.snapshot(&key, stale_time);
                    drop(guard);
                    self.revalidate(key, id, fetch);
                    return snapshot;
                }
                debug!(?key, "Cache MISS");
                (fetch, id)
            }
        };

        let mut waiter = Waiter {
            cache: self,
            key: &key,
            flight_id,
            settled: false,
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = fetch => Some(outcome),
        };
        let Some(outcome) = outcome else {
            debug!(?key, "Viewer cancelled, discarding result");
            return QueryState::discarded();
        };
        waiter.settled = true;
        drop(waiter);

        self.settle(&key, flight_id, &outcome);
        self.resolve(&key, outcome)
    }

    /// `query` followed by a pure projection of the shared value.
    pub async fn query_select<T, S, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        cancel: &CancelToken,
        fetcher: F,
        select: impl FnOnce(&T) -> S,
    ) -> QueryState<S>
    where
        T: Send + Sync + 'static,
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.query(key, options, cancel, fetcher)
            .await
            .map(|data| select(&data))
    }

    /// Current state of `key` without fetching.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<Arc<T>> {
        self.peek_with(key, self.stale_time)
    }

    fn peek_with<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
    ) -> QueryState<Arc<T>> {
        self.lock()
            .map
            .get(key)
            .map(|entry| entry.snapshot(key, stale_time))
            .unwrap_or_default()
    }

    /// Seeds `key` with a fresh value.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let mut entries = self.lock();
        let entry = entries.map.entry(key).or_default();
        entry.data = Some(Arc::new(value));
        entry.error = None;
        entry.status = QueryStatus::Success;
        entry.fetched_at = Some(Instant::now());
        entry.updated_at = Some(Utc::now());
        entry.invalidated = false;
    }

    /// Marks every entry matched by any filter as stale, under one lock.
    pub fn invalidate(&self, filters: &[KeyFilter]) -> usize {
        self.invalidate_where(|key| filters.iter().any(|filter| filter.matches(key)))
    }

    pub fn invalidate_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.map.iter_mut() {
            if predicate(key) {
                entry.invalidated = true;
                entry.epoch += 1;
                count += 1;
            }
        }
        debug!(count, "Invalidated cache entries");
        count
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        let removed = self.lock().map.remove(key);
        match removed {
            Some(entry) => {
                if let Some(flight) = entry.flight {
                    flight.cancel.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Drops every matching entry, cancelling fetches still in flight.
    pub fn remove_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let mut entries = self.lock();
        let before = entries.map.len();
        entries.map.retain(|key, entry| {
            let keep = !predicate(key);
            if !keep && let Some(flight) = &entry.flight {
                flight.cancel.cancel();
            }
            keep
        });
        before - entries.map.len()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        for entry in entries.map.values() {
            if let Some(flight) = &entry.flight {
                flight.cancel.cancel();
            }
        }
        entries.map.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches started since creation.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn revalidate(&self, key: QueryKey, flight_id: u64, fetch: SharedFetch) {
        let cache = self.clone();
        tokio::spawn(async move {
            let outcome = fetch.await;
            cache.settle(&key, flight_id, &outcome);
        });
    }

    fn settle(&self, key: &QueryKey, flight_id: u64, outcome: &Outcome) {
        let mut entries = self.lock();
        let Some(entry) = entries.map.get_mut(key) else {
            return;
        };
        // first waiter to finish settles; the rest find the flight gone
        let Some(flight) = entry.flight.take_if(|flight| flight.id == flight_id) else {
            return;
        };
        match outcome {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.status = QueryStatus::Success;
                entry.fetched_at = Some(Instant::now());
                entry.updated_at = Some(Utc::now());
                entry.invalidated = entry.epoch != flight.epoch;
            }
            Err(Error::Cancelled) => {
                debug!(?key, "Fetch cancelled");
            }
            Err(error) => {
                debug!(?key, %error, "Fetch failed, keeping last data");
                entry.error = Some(error.clone());
                entry.status = QueryStatus::Error;
            }
        }
    }

    fn leave(&self, key: &QueryKey, flight_id: u64) {
        let mut entries = self.lock();
        let Some(entry) = entries.map.get_mut(key) else {
            return;
        };
        let Some(flight) = entry.flight.as_mut().filter(|flight| flight.id == flight_id) else {
            return;
        };
        flight.waiters = flight.waiters.saturating_sub(1);
        if flight.waiters > 0 {
            return;
        }
        debug!(?key, "Every viewer cancelled, aborting fetch");
        flight.cancel.cancel();
        entry.flight = None;
        let untouched =
            entry.status == QueryStatus::Idle && entry.data.is_none() && entry.error.is_none();
        if untouched {
            entries.map.remove(key);
        }
    }

    fn resolve<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        outcome: Outcome,
    ) -> QueryState<Arc<T>> {
        match outcome {
            Ok(value) => match downcast::<T>(key, value) {
                Some(data) => {
                    let updated_at = self
                        .lock()
                        .map
                        .get(key)
                        .and_then(|entry| entry.updated_at)
                        .unwrap_or_else(Utc::now);
                    QueryState::success(data, updated_at)
                }
                None => QueryState::failed(Error::CacheType(format!("{key:?}")), None),
            },
            Err(error) => {
                let last_good = self
                    .lock()
                    .map
                    .get(key)
                    .and_then(|entry| entry.data.clone())
                    .and_then(|value| downcast(key, value));
                QueryState::failed(error, last_good)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Source;
    use crate::core::models::Platform;
    use crate::query::key;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn league_key(id: &str) -> QueryKey {
        key::league_info(Platform::Sleeper, id)
    }

    async fn wait_until_loading(cache: &QueryCache, key: &QueryKey) {
        while !cache.peek::<u32>(key).is_loading() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancelToken::new();

        let fetcher = |calls: Arc<AtomicUsize>| {
            move |_token: CancelToken| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(vec![1u32, 2, 3])
            }
        };

        let (a, b) = tokio::join!(
            cache.query(
                key::transactions(Platform::Sleeper, "123", Some(5)),
                QueryOptions::default(),
                &cancel,
                fetcher(calls.clone()),
            ),
            cache.query(
                key::transactions(Platform::Sleeper, "123", Some(5)),
                QueryOptions::default(),
                &cancel,
                fetcher(calls.clone()),
            ),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (a, b) = (a.data.unwrap(), b.data.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, vec![1, 2, 3]);

        let week6 = cache
            .query(
                key::transactions(Platform::Sleeper, "123", Some(6)),
                QueryOptions::default(),
                &cancel,
                fetcher(calls.clone()),
            )
            .await;
        assert!(week6.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancelToken::new();

        for _ in 0..3 {
            let calls = calls.clone();
            let state = cache
                .query(league_key("1"), QueryOptions::default(), &cancel, move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42u32)
                })
                .await;
            assert_eq!(state.data.as_deref(), Some(&42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_refetches() {
        let cache = QueryCache::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancelToken::new();

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .query(league_key("1"), QueryOptions::default(), &cancel, move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1u32)
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_query_creates_nothing() {
        let cache = QueryCache::default();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let state = cache
            .query(
                league_key(""),
                QueryOptions::enabled_if(false),
                &CancelToken::new(),
                move |_| async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(0u32)
                },
            )
            .await;

        assert!(state.is_idle());
        assert!(state.data.is_none());
        assert!(!called.load(Ordering::SeqCst));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_query_sees_existing_data() {
        let cache = QueryCache::default();
        cache.set_data(league_key("1"), 9u32);

        let state = cache
            .query::<u32, _, _>(
                league_key("1"),
                QueryOptions::enabled_if(false),
                &CancelToken::new(),
                |_| async { Ok(0u32) },
            )
            .await;
        assert!(state.is_success());
        assert_eq!(state.data.as_deref(), Some(&9));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_data() {
        let cache = QueryCache::default();
        let cancel = CancelToken::new();
        cache.set_data(league_key("1"), 7u32);
        cache.invalidate(&[KeyFilter::Exact(league_key("1"))]);

        let state = cache
            .query::<u32, _, _>(league_key("1"), QueryOptions::default(), &cancel, |_| async {
                Err(Error::status(
                    Source::Platform(Platform::Sleeper),
                    500,
                    "Internal Server Error",
                ))
            })
            .await;

        assert!(state.is_error());
        assert_eq!(state.data.as_deref(), Some(&7));
        assert_eq!(state.error.as_ref().and_then(Error::status_code), Some(500));

        let peeked = cache.peek::<u32>(&league_key("1"));
        assert!(peeked.is_error());
        assert_eq!(peeked.data.as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn test_invalidation_triggers_refetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancelToken::new();
        let fetch = |calls: Arc<AtomicUsize>| {
            move |_: CancelToken| async move { Ok(calls.fetch_add(1, Ordering::SeqCst) as u32) }
        };

        cache
            .query(league_key("1"), QueryOptions::default(), &cancel, fetch(calls.clone()))
            .await;
        cache
            .query(league_key("2"), QueryOptions::default(), &cancel, fetch(calls.clone()))
            .await;

        let count = cache.invalidate(&[KeyFilter::Exact(league_key("1"))]);
        assert_eq!(count, 1);
        assert!(cache.peek::<u32>(&league_key("1")).is_stale);
        assert!(!cache.peek::<u32>(&league_key("2")).is_stale);

        let state = cache
            .query(league_key("1"), QueryOptions::default(), &cancel, fetch(calls.clone()))
            .await;
        assert_eq!(state.data.as_deref(), Some(&2));
        assert!(!state.is_stale);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidation_during_flight_keeps_entry_stale() {
        let cache = QueryCache::default();
        let release = Arc::new(Notify::new());
        let key = league_key("1");

        let handle = {
            let cache = cache.clone();
            let release = release.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .query(key, QueryOptions::default(), &CancelToken::new(), move |_| async move {
                        release.notified().await;
                        Ok(1u32)
                    })
                    .await
            })
        };

        wait_until_loading(&cache, &key).await;
        cache.invalidate(&[KeyFilter::Exact(key.clone())]);
        release.notify_one();

        let state = handle.await.unwrap();
        assert_eq!(state.data.as_deref(), Some(&1));
        assert!(cache.peek::<u32>(&key).is_stale);
    }

    #[tokio::test]
    async fn test_select_does_not_touch_stored_value() {
        let cache = QueryCache::default();
        let cancel = CancelToken::new();

        let evens = cache
            .query_select(
                league_key("1"),
                QueryOptions::default(),
                &cancel,
                |_| async { Ok(vec![1u32, 2, 3, 4]) },
                |all: &Vec<u32>| all.iter().filter(|n| *n % 2 == 0).count(),
            )
            .await;
        assert_eq!(evens.data, Some(2));

        let raw = cache.peek::<Vec<u32>>(&league_key("1"));
        assert_eq!(raw.data.as_deref(), Some(&vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_abort_shared_fetch() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let key = league_key("1");
        let leaving = CancelToken::new();
        let staying = CancelToken::new();

        let fetcher = |calls: Arc<AtomicUsize>, release: Arc<Notify>| {
            move |_: CancelToken| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                release.notified().await;
                Ok(5u32)
            }
        };

        let (left, stayed, _) = tokio::join!(
            cache.query(
                key.clone(),
                QueryOptions::default(),
                &leaving,
                fetcher(calls.clone(), release.clone()),
            ),
            cache.query(
                key.clone(),
                QueryOptions::default(),
                &staying,
                fetcher(calls.clone(), release.clone()),
            ),
            async {
                wait_until_loading(&cache, &key).await;
                leaving.cancel();
                tokio::time::sleep(Duration::from_millis(10)).await;
                release.notify_one();
            }
        );

        assert_eq!(left.error, Some(Error::Cancelled));
        assert!(left.data.is_none());
        assert_eq!(stayed.data.as_deref(), Some(&5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_waiters_cancelled_aborts_fetch() {
        let cache = QueryCache::default();
        let key = league_key("1");
        let cancel = CancelToken::new();
        let aborted = Arc::new(AtomicBool::new(false));

        let flag = aborted.clone();
        let (state, _) = tokio::join!(
            cache.query::<u32, _, _>(key.clone(), QueryOptions::default(), &cancel, move |token| {
                async move {
                    token.cancelled().await;
                    flag.store(true, Ordering::SeqCst);
                    Err(Error::Cancelled)
                }
            }),
            async {
                wait_until_loading(&cache, &key).await;
                cancel.cancel();
            }
        );

        assert!(state.is_idle());
        assert_eq!(state.error, Some(Error::Cancelled));
        assert!(cache.peek::<u32>(&key).is_idle());
        assert!(cache.is_empty());

        // the flight's future is dropped with the entry
        assert!(!aborted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_already_cancelled_viewer_never_fetches() {
        let cache = QueryCache::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let state = cache
            .query::<u32, _, _>(league_key("1"), QueryOptions::default(), &cancel, |_| async {
                Ok(1u32)
            })
            .await;
        assert_eq!(state.error, Some(Error::Cancelled));
        assert_eq!(cache.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_background_refetch_serves_stale_data() {
        let cache = QueryCache::default();
        let cancel = CancelToken::new();
        let release = Arc::new(Notify::new());
        let key = league_key("1");
        cache.set_data(key.clone(), 1u32);
        cache.invalidate(&[KeyFilter::Exact(key.clone())]);

        let notify = release.clone();
        let state = cache
            .query(
                key.clone(),
                QueryOptions::default().with_background_refetch(),
                &cancel,
                move |_| async move {
                    notify.notified().await;
                    Ok(2u32)
                },
            )
            .await;
        assert!(state.is_success());
        assert!(state.is_stale);
        assert_eq!(state.data.as_deref(), Some(&1));

        release.notify_one();
        while cache.peek::<u32>(&key).data.as_deref() != Some(&2) {
            tokio::task::yield_now().await;
        }
        assert!(!cache.peek::<u32>(&key).is_stale);
    }

    #[tokio::test]
    async fn test_fetcher_may_read_the_cache() {
        let cache = QueryCache::default();
        cache.set_data(key::profile(), 3u32);

        let inner = cache.clone();
        let state = cache
            .query(league_key("1"), QueryOptions::default(), &CancelToken::new(), move |_| {
                let seed = inner.peek::<u32>(&key::profile()).data.map_or(0, |n| *n);
                async move { Ok(seed + 1) }
            })
            .await;
        assert_eq!(state.data.as_deref(), Some(&4));
    }

    #[tokio::test]
    async fn test_type_mismatch_hides_data() {
        let cache = QueryCache::default();
        cache.set_data(league_key("1"), "text".to_string());
        let state = cache.peek::<u32>(&league_key("1"));
        assert!(state.data.is_none());
        assert_eq!(
            cache.peek::<String>(&league_key("1")).data.as_deref(),
            Some(&"text".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = QueryCache::default();
        cache.set_data(league_key("1"), 1u32);
        cache.set_data(league_key("2"), 2u32);
        assert_eq!(cache.len(), 2);

        assert!(cache.remove(&league_key("1")));
        assert!(!cache.remove(&league_key("1")));
        assert_eq!(cache.len(), 1);

        cache.set_data(key::profile(), 3u32);
        cache.set_data(key::saved_leagues(), 4u32);
        let removed = cache.remove_where(|k| *k == key::profile());
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
