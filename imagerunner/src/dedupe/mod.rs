//! In-flight work deduplication.
//!
//! Both the ingest side (copying originals) and the render side (downloading
//! originals) can receive many concurrent requests for the same underlying
//! asset. [`InflightMap`] ensures at most one unit of work runs per key:
//! late callers attach to the first caller's future instead of re-triggering
//! the work.
//!
//! Eviction rules:
//! - terminal failure removes the entry, so a later caller retries from
//!   scratch (failures are assumed possibly transient);
//! - terminal success keeps the entry for the process lifetime, answering
//!   later duplicates instantly (successful work is assumed idempotent).
//!
//! The check-then-insert step happens under a single lock, so two callers
//! racing on the same key cannot both start the work.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure of a deduplicated unit of work.
///
/// The error is shared verbatim with every caller attached to the same
/// in-flight future, so it carries a display rendering of the cause rather
/// than the cause itself.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct InflightError(pub String);

impl InflightError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

type SharedWork<T> = Shared<BoxFuture<'static, Result<T, InflightError>>>;

/// Map from key to the in-flight (or completed) future computing its value.
pub struct InflightMap<K, T> {
    inner: Arc<Mutex<HashMap<K, SharedWork<T>>>>,
}

impl<K, T> Clone for InflightMap<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Default for InflightMap<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> InflightMap<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the future registered for `key`, starting `work` if none is.
    ///
    /// `work` is only invoked when `key` has no live entry; otherwise the
    /// existing future is returned and `work` is dropped unused. Exactly one
    /// invocation occurs per key per success. A failing invocation evicts
    /// the entry before its error becomes observable, so every caller that
    /// attached to it sees the same failure and the next fresh caller
    /// starts over.
    pub fn get_or_start<F, Fut>(&self, key: K, work: F) -> impl Future<Output = Result<T, InflightError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, InflightError>> + Send + 'static,
    {
        let mut map = self.inner.lock().unwrap();
        if let Some(existing) = map.get(&key) {
            return existing.clone();
        }

        let inner = Arc::clone(&self.inner);
        let evict_key = key.clone();
        let fut = work();
        let shared = async move {
            let result = fut.await;
            if result.is_err() {
                inner.lock().unwrap().remove(&evict_key);
            }
            result
        }
        .boxed()
        .shared();

        map.insert(key, shared.clone());
        shared
    }

    /// Whether `key` currently has a live entry (in flight or completed).
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().unwrap().contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
