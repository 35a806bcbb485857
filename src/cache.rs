//! Get-or-create cache service used for provider metadata and table schemas.
//!
//! Entries live as long as the cache; nothing is evicted. [`MutexCache`] holds one
//! `tokio::sync::Mutex` across lookup *and* creation, so concurrent first access to a key
//! runs the loader once and every caller receives the same `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::error::SqlGlueError;

/// Explicit cache service: `get_or_try_create(key) -> Arc<V>`.
pub trait CacheService<K, V>: Send + Sync {
    /// Return the cached value for `key`, running `create` to populate it on first access.
    /// A failed `create` leaves the key absent.
    #[allow(clippy::manual_async_fn)]
    fn get_or_try_create<F, Fut>(
        &self,
        key: K,
        create: F,
    ) -> impl Future<Output = Result<Arc<V>, SqlGlueError>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, SqlGlueError>> + Send;

    #[allow(clippy::manual_async_fn)]
    fn cached(&self, key: &K) -> impl Future<Output = Option<Arc<V>>> + Send;

    #[allow(clippy::manual_async_fn)]
    fn len(&self) -> impl Future<Output = usize> + Send;
}

/// [`CacheService`] backed by a single mutex around a `HashMap`.
#[derive(Debug)]
pub struct MutexCache<K, V> {
    entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for MutexCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> MutexCache<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> CacheService<K, V> for MutexCache<K, V>
where
    K: Eq + Hash + std::fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    #[allow(clippy::manual_async_fn)]
    fn get_or_try_create<F, Fut>(
        &self,
        key: K,
        create: F,
    ) -> impl Future<Output = Result<Arc<V>, SqlGlueError>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, SqlGlueError>> + Send,
    {
        async move {
            let mut entries = self.entries.lock().await;
            if let Some(hit) = entries.get(&key) {
                trace!(?key, "cache hit");
                return Ok(Arc::clone(hit));
            }
            let value = Arc::new(create().await?);
            entries.insert(key, Arc::clone(&value));
            Ok(value)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn cached(&self, key: &K) -> impl Future<Output = Option<Arc<V>>> + Send {
        async move { self.entries.lock().await.get(key).cloned() }
    }

    #[allow(clippy::manual_async_fn)]
    fn len(&self) -> impl Future<Output = usize> + Send {
        async move { self.entries.lock().await.len() }
    }
}
