//! Keyed async cache for chunk results
//!
//! The engine never generates chunks itself: it hands a generator to a
//! [`KeyedAsyncCache`], which guarantees at most one generation in flight per
//! key and decides which thread runs it. [`TimedCache`] is the bundled
//! implementation, with idle-timeout expiry and inline or rayon-pooled
//! generation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::promise::{AsyncResult, Settler};

/// Produces the value for a key on a cache miss
pub type Generator<K, V> = Box<dyn FnOnce(K) -> Result<V> + Send + 'static>;

/// Where a cache runs generators
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// On the thread that triggered the miss, before `get_or_create` returns
    #[default]
    Inline,
    /// On the rayon global thread pool
    ThreadPool,
}

/// Keyed table of pending or settled results
pub trait KeyedAsyncCache<K, V>: Send + Sync + 'static {
    /// Existing result for `key`, or a new one whose generation starts now
    ///
    /// At most one generation per key is in flight.
    ///
    /// # Arguments
    /// * `key` - Key to look up
    /// * `ttl` - Idle timeout of a newly created entry
    /// * `generator` - Run once on a miss; dropped unused on a hit
    ///
    /// # Returns
    /// The shared result for `key`, pending until generation finishes
    fn get_or_create(&self, key: K, ttl: Duration, generator: Generator<K, V>) -> AsyncResult<V>;

    /// Store an already computed value, replacing any existing entry
    ///
    /// An in-flight generation for the replaced entry still settles its own
    /// result but no longer touches the cache.
    ///
    /// # Arguments
    /// * `key` - Key to store under
    /// * `value` - The value; the new entry is settled immediately
    /// * `ttl` - Idle timeout of the new entry
    ///
    /// # Returns
    /// The replaced result, if there was one
    fn insert(&self, key: K, value: V, ttl: Duration) -> Option<AsyncResult<V>>;

    /// Existing result for `key`; refreshes its idle deadline
    fn get_if_present(&self, key: &K) -> Option<AsyncResult<V>>;

    fn remove(&self, key: &K) -> Option<AsyncResult<V>>;

    /// Snapshot of the current keys
    fn keys(&self) -> Vec<K>;

    /// Remove settled entries idle past their deadline
    fn evict_expired(&self, now: Instant) -> Vec<(K, AsyncResult<V>)>;

    /// Remove every entry
    fn clear(&self) -> Vec<(K, AsyncResult<V>)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry<V> {
    result: AsyncResult<V>,
    timeout: Duration,
    /// `None` when the timeout is too large to represent
    deadline: Option<Instant>,
}

impl<V> Entry<V> {
    fn touch(&mut self, now: Instant) {
        self.deadline = now.checked_add(self.timeout);
    }
}

type Table<K, V> = Mutex<HashMap<K, Entry<V>>>;

/// Hash-map cache with per-entry idle timeout
///
/// Each entry keeps the time it was last touched. [`KeyedAsyncCache::evict_expired`]
/// drops settled entries that stayed untouched past their timeout; nothing is
/// evicted automatically.
pub struct TimedCache<K, V> {
    /// Results by key, shared with generation jobs so a failed job can
    /// remove its own entry
    entries: Arc<Table<K, V>>,
    /// Where generators run
    mode: GenerationMode,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `mode` - Whether generators run inline or on the rayon pool
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            mode,
        }
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        lock_table(&self.entries)
    }
}

fn lock_table<K, V>(table: &Table<K, V>) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one generation and settle its result
///
/// A failed key is removed before the error is broadcast, so whoever reacts
/// to the error can retry and get a fresh generation.
fn generate<K, V>(
    table: &Table<K, V>,
    key: K,
    cell: AsyncResult<V>,
    settler: Settler<V>,
    generator: Generator<K, V>,
) where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Send + 'static,
{
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| generator(key.clone())))
        .unwrap_or_else(|payload| Err(Error::from_panic(payload)));

    match &outcome {
        Ok(_) => log::trace!("Generated {:?} in {:?}", key, started.elapsed()),
        Err(e) => {
            log::warn!("Generation of {:?} failed: {}", key, e);
            let mut entries = lock_table(table);
            if entries.get(&key).is_some_and(|entry| entry.result.ptr_eq(&cell)) {
                entries.remove(&key);
            }
        }
    }

    let _ = settler.complete(outcome);
}

impl<K, V> KeyedAsyncCache<K, V> for TimedCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get_or_create(&self, key: K, ttl: Duration, generator: Generator<K, V>) -> AsyncResult<V> {
        let now = Instant::now();
        let cell = {
            let mut entries = self.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.touch(now);
                return entry.result.clone();
            }
            let cell = AsyncResult::pending();
            entries.insert(
                key.clone(),
                Entry {
                    result: cell.clone(),
                    timeout: ttl,
                    deadline: now.checked_add(ttl),
                },
            );
            cell
        };

        let settler = cell.settler();
        let table = Arc::clone(&self.entries);
        let job_cell = cell.clone();
        let job = move || generate(&table, key, job_cell, settler, generator);
        match self.mode {
            GenerationMode::Inline => job(),
            GenerationMode::ThreadPool => rayon::spawn(job),
        }
        cell
    }

    fn insert(&self, key: K, value: V, ttl: Duration) -> Option<AsyncResult<V>> {
        let now = Instant::now();
        let entry = Entry {
            result: AsyncResult::resolved(value),
            timeout: ttl,
            deadline: now.checked_add(ttl),
        };
        self.lock().insert(key, entry).map(|old| old.result)
    }

    fn get_if_present(&self, key: &K) -> Option<AsyncResult<V>> {
        let mut entries = self.lock();
        entries.get_mut(key).map(|entry| {
            entry.touch(Instant::now());
            entry.result.clone()
        })
    }

    fn remove(&self, key: &K) -> Option<AsyncResult<V>> {
        self.lock().remove(key).map(|entry| entry.result)
    }

    fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    fn evict_expired(&self, now: Instant) -> Vec<(K, AsyncResult<V>)> {
        let mut entries = self.lock();
        // In-flight entries never expire, otherwise a second generation could start
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| {
                entry.deadline.is_some_and(|deadline| now > deadline) && entry.result.is_settled()
            })
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| entries.remove(&key).map(|entry| (key, entry.result)))
            .collect()
    }

    fn clear(&self) -> Vec<(K, AsyncResult<V>)> {
        self.lock()
            .drain()
            .map(|(key, entry)| (key, entry.result))
            .collect()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
