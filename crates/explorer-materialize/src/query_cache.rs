//! Deduplicating query cache.
//!
//! Fetches never run inside a caller's future. Each one is a detached
//! tokio task, recorded per key while it runs, that writes its own result
//! into the cache. Callers only await a shared handle to it, so dropping a
//! caller neither cancels nor restarts the fetch, and a response that
//! arrives after every caller gave up still becomes the cached value.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;

use explorer_connector::{ConnectorError, Operation};
use explorer_core::{CacheConfig, Engine, RawId};

use crate::error::{FetchError, FetchResult};

/// Identifies one cached query: the same operation on the same id against
/// the same engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub engine: Engine,
    pub operation: Operation,
    pub id: RawId,
}

impl QueryKey {
    pub fn new(engine: Engine, operation: Operation, id: RawId) -> Self {
        Self {
            engine,
            operation,
            id,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.engine, self.operation, self.id)
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;
type InFlight<V> = Arc<Mutex<HashMap<QueryKey, SharedFetch<V>>>>;

/// Values keyed by [`QueryKey`], evicted by capacity and time-to-live.
///
/// Clone is cheap; clones share storage and in-flight fetches.
#[derive(Clone)]
pub struct QueryCache<V: Clone + Send + Sync + 'static> {
    cache: Cache<QueryKey, V>,
    loading: InFlight<V>,
    refreshing: InFlight<V>,
}

impl<V: Clone + Send + Sync + 'static> QueryCache<V> {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(time_to_live)
                .build(),
            loading: Arc::new(Mutex::new(HashMap::new())),
            refreshing: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity, config.time_to_live())
    }

    /// The cached value, if present and not expired.
    pub async fn get(&self, key: &QueryKey) -> Option<V> {
        self.cache.get(key).await
    }

    /// Return the cached value, or run `fetch` once and cache its result.
    ///
    /// Concurrent callers for the same key share a single fetch, and a
    /// caller that goes away never causes it to be restarted. Errors are
    /// not cached.
    pub async fn ensure_query_data<F, Fut>(&self, key: QueryKey, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, ConnectorError>> + Send + 'static,
    {
        let mut fetch = Some(fetch);
        loop {
            if let Some(value) = self.cache.get(&key).await {
                return Ok(value);
            }
            let shared = {
                let mut loading = lock(&self.loading);
                match loading.get(&key) {
                    Some(in_flight) if in_flight.peek().is_none() => Some(in_flight.clone()),
                    // Finished between the lookup above and taking the lock.
                    _ if self.cache.contains_key(&key) => None,
                    _ => fetch.take().map(|fetch| {
                        let task = spawn_fetch(&self.cache, &self.loading, key.clone(), fetch);
                        loading.insert(key.clone(), task.clone());
                        task
                    }),
                }
            };
            if let Some(shared) = shared {
                return shared.await;
            }
        }
    }

    /// Run `fetch` even if a value is cached, and cache the fresh result.
    ///
    /// A forced fetch already in flight for the same key is joined rather
    /// than duplicated.
    pub async fn fetch_query<F, Fut>(&self, key: QueryKey, fetch: F) -> FetchResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, ConnectorError>> + Send + 'static,
    {
        let shared = {
            let mut refreshing = lock(&self.refreshing);
            match refreshing.get(&key) {
                Some(in_flight) if in_flight.peek().is_none() => in_flight.clone(),
                _ => {
                    let task = spawn_fetch(&self.cache, &self.refreshing, key.clone(), fetch);
                    refreshing.insert(key, task.clone());
                    task
                }
            }
        };
        shared.await
    }

    pub async fn invalidate(&self, key: &QueryKey) {
        self.cache.invalidate(key).await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Number of keys with a fetch still running.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.loading).len() + lock(&self.refreshing).len()
    }
}

fn lock<V>(table: &InFlight<V>) -> MutexGuard<'_, HashMap<QueryKey, SharedFetch<V>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start `fetch` on a detached task right away. The task caches its own
/// result and then leaves `table`; the returned handle only observes it.
///
/// Must be called with `table` locked and the handle recorded before the
/// lock is released, so the task cannot leave before it has arrived.
fn spawn_fetch<V, F, Fut>(
    cache: &Cache<QueryKey, V>,
    table: &InFlight<V>,
    key: QueryKey,
    fetch: F,
) -> SharedFetch<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<V, ConnectorError>> + Send + 'static,
{
    let cache = cache.clone();
    let table = table.clone();
    let handle = tokio::spawn(async move {
        let result = fetch().await;
        match &result {
            Ok(value) => cache.insert(key.clone(), value.clone()).await,
            Err(e) => tracing::debug!(key = %key, error = %e, "Fetch failed"),
        }
        lock(&table).remove(&key);
        result.map_err(FetchError::Connector)
    });
    async move {
        match handle.await {
            Ok(result) => result.map_err(Arc::new),
            Err(e) => Err(Arc::new(FetchError::Aborted(e.to_string()))),
        }
    }
    .boxed()
    .shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(id: &str) -> QueryKey {
        QueryKey::new(Engine::Gremlin, Operation::VertexDetails, RawId::from(id))
    }

    fn cache() -> QueryCache<String> {
        QueryCache::new(100, Duration::from_secs(60))
    }

    fn counted(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, ConnectorError>> + Send + 'static {
        let calls = calls.clone();
        let value = value.to_string();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_ensures_share_one_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let (a, b) = tokio::join!(
            cache.ensure_query_data(key("1"), counted(&calls, "first")),
            cache.ensure_query_data(key("1"), counted(&calls, "second")),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cached = cache
            .ensure_query_data(key("1"), counted(&calls, "third"))
            .await
            .unwrap();
        assert_ne!(cached, "third");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forced_fetches_replace_the_value_and_dedupe() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .ensure_query_data(key("1"), counted(&calls, "old"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            cache.fetch_query(key("1"), counted(&calls, "new")),
            cache.fetch_query(key("1"), counted(&calls, "newer")),
        );
        assert_eq!(a.unwrap(), "new");
        assert_eq!(b.unwrap(), "new");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(&key("1")).await.as_deref(), Some("new"));

        // Finished refreshes are not reused.
        cache.fetch_query(key("1"), counted(&calls, "newest")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = cache();
        let failed = cache
            .ensure_query_data(key("1"), || async {
                Err(ConnectorError::QueryBuild(
                    explorer_connector::QueryBuildError::InvalidIri(String::new()),
                ))
            })
            .await;
        assert!(matches!(failed.unwrap_err().as_ref(), FetchError::Connector(_)));
        assert!(cache.get(&key("1")).await.is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .ensure_query_data(key("1"), counted(&calls, "ok"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_first_caller_keeps_its_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let dropped = tokio::time::timeout(
            Duration::from_millis(5),
            cache.ensure_query_data(key("1"), counted(&calls, "first")),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(cache.in_flight_count(), 1);

        let value = cache
            .ensure_query_data(key("1"), counted(&calls, "second"))
            .await
            .unwrap();
        assert_eq!(value, "first");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_the_next_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.ensure_query_data(key("1"), counted(&calls, "a")).await.unwrap();
        assert_eq!(cache.entry_count().await, 1);
        cache.invalidate(&key("1")).await;
        cache.ensure_query_data(key("1"), counted(&calls, "b")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
