//! Process-wide lookup cache with single-flight coordination.
//!
//! Two cooperating pieces:
//! - [`Coalescer`] hands out a per-key mutex so that at most one compute for a
//!   given key is in flight at a time, no matter how many concurrent formula
//!   requests need it.
//! - [`LookupCache`] stores resolved values, positive and negative alike.
//!   Chemical facts are immutable, so entries are never invalidated within a
//!   process run and there is no eviction.
//!
//! A caller that loses the race to start a compute suspends on the key's
//! mutex; when it wakes, the winner has already stored the result, so the
//! re-check under the guard finds it and no duplicate outbound call is made.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

// ---

/// Per-key in-flight registry.
///
/// Registration and de-registration of a key are atomic with respect to
/// concurrent joiners: the registry map is only touched under its own lock,
/// and the per-key mutex is held across the whole {recheck, compute, store}
/// sequence.
pub struct Coalescer {
    // ---
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the coordination guard for `key`, suspending while another
    /// caller holds it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        // ---
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new()
    }
}

// ---

/// Key-value store for resolved lookups, safe under concurrent callers.
///
/// Negative results are first-class values: a confirmed "not found" is stored
/// (encoded in `V`, e.g. `Option<Cid>::None`) so repeated failing lookups are
/// not re-issued. Transient compute failures (`Err`) are NOT stored, so a
/// later request retries them.
pub struct LookupCache<V> {
    // ---
    entries: RwLock<HashMap<String, V>>,
    coalescer: Coalescer,
}

impl<V: Clone> LookupCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            coalescer: Coalescer::new(),
        }
    }

    /// Read a cached value without computing.
    pub async fn get(&self, key: &str) -> Option<V> {
        // ---
        self.entries.read().await.get(key).cloned()
    }

    /// Return the cached value for `key`, computing and storing it on miss.
    ///
    /// `compute` is evaluated at most once concurrently per key; concurrent
    /// callers for the same key suspend and receive the stored result. The
    /// returned flag is `true` when the value was served from the cache
    /// (including the case where this caller waited out another caller's
    /// in-flight compute).
    pub async fn get_or_try_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // ---
        if let Some(value) = self.get(key).await {
            return Ok((value, true));
        }

        let _guard = self.coalescer.acquire(key).await;

        // Re-check under the guard: another caller may have completed the
        // compute while we waited.
        if let Some(value) = self.get(key).await {
            return Ok((value, true));
        }

        let value = compute().await?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok((value, false))
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        // ---
        self.entries.read().await.len()
    }
}

impl<V: Clone> Default for LookupCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
