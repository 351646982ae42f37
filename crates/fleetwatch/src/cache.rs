//! Coalescing TTL cache for checkers that share an expensive backend.
//!
//! Many devices often map onto one backend resource (a room health
//! endpoint, for instance). The [`Coalescer`] keeps the last good payload per
//! key for a fixed TTL and makes sure that, whatever the number of concurrent
//! callers, at most one refresh per key is in flight at any time. Every
//! caller attached to a refresh observes the same outcome.
//!
//! Failed refreshes are never stored, so the next call simply retries.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::debug;

type Refresh<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Per-key TTL cache with duplicate suppression for concurrent refreshes
pub struct Coalescer<K, V, E> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    in_flight: Arc<Mutex<HashMap<K, Refresh<V, E>>>>,
}

impl<K, V, E> Coalescer<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached value for `key`, refreshing it through `fetch` when
    /// it is missing or expired.
    pub async fn get<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.fresh(&key).await {
            return Ok(value);
        }

        self.join_or_start(key, false, fetch).await
    }

    /// Fetch a new value for `key` even if the cached one is still valid.
    /// A refresh already in flight for the key is joined rather than duplicated.
    pub async fn refresh<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.join_or_start(key, true, fetch).await
    }

    /// Whether a non-expired entry exists for `key`
    pub async fn contains_fresh(&self, key: &K) -> bool {
        self.fresh(key).await.is_some()
    }

    /// Drop the cached entry for `key`
    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    async fn fresh(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn join_or_start<F, Fut>(&self, key: K, force: bool, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let refresh = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(existing) = in_flight.get(&key) {
                debug!(?key, "joining in-flight refresh");
                existing.clone()
            } else {
                // A refresh may have landed between the first read and the lock
                if !force {
                    if let Some(value) = self.fresh(&key).await {
                        return Ok(value);
                    }
                }

                debug!(?key, force, "starting refresh");
                let refresh = self.start(key.clone(), fetch());
                in_flight.insert(key, refresh.clone());
                refresh
            }
        };

        refresh.await
    }

    fn start<Fut>(&self, key: K, fetch: Fut) -> Refresh<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let in_flight = Arc::clone(&self.in_flight);
        let ttl = self.ttl;
        let task_key = key.clone();

        // Spawned so the fetch makes progress on its own and a panic inside it
        // surfaces as a JoinError instead of unwinding through every caller.
        let task = tokio::spawn(async move {
            let result = fetch.await;
            if let Ok(value) = &result {
                let entry = CacheEntry { value: value.clone(), expires_at: Instant::now() + ttl };
                entries.write().await.insert(task_key, entry);
            }
            result
        });

        async move {
            let result = task.await.unwrap_or_else(|e| Err(E::from(e)));
            in_flight.lock().await.remove(&key);
            result
        }
        .boxed()
        .shared()
    }
}
