//! Fan-in over collections of pending results
//!
//! Every sub-computation is started up front. The joined result resolves
//! once all of them succeed. On the first failure, sub-results that already
//! succeeded are disposed and then the joined result is rejected; anything
//! that succeeds later is disposed on arrival.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use super::AsyncResult;

/// Release hook for values discarded by a failed fan-in
///
/// The default implementation just drops the value.
pub trait Dispose: Sized {
    fn dispose(self) {}
}

impl<T: Dispose> Dispose for Vec<T> {
    fn dispose(self) {
        for item in self {
            item.dispose();
        }
    }
}

struct JoinState<W> {
    slots: Vec<Option<W>>,
    remaining: usize,
    failed: bool,
}

/// Join results, preserving input order
pub fn join_list<W>(parts: Vec<AsyncResult<W>>) -> AsyncResult<Vec<W>>
where
    W: Dispose + Clone + Send + 'static,
{
    let joined = AsyncResult::pending();
    if parts.is_empty() {
        let _ = joined.resolve(Vec::new());
        return joined;
    }

    let state = Arc::new(Mutex::new(JoinState {
        slots: (0..parts.len()).map(|_| None).collect(),
        remaining: parts.len(),
        failed: false,
    }));

    for (index, part) in parts.into_iter().enumerate() {
        let state = Arc::clone(&state);
        let joined = joined.clone();
        part.on_settled(move |outcome| {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.failed {
                drop(guard);
                if let Ok(late) = outcome {
                    late.dispose();
                }
                return;
            }

            match outcome {
                Ok(value) => {
                    guard.slots[index] = Some(value);
                    guard.remaining -= 1;
                    if guard.remaining == 0 {
                        let values: Vec<W> = guard.slots.drain(..).flatten().collect();
                        drop(guard);
                        let _ = joined.resolve(values);
                    }
                }
                Err(error) => {
                    guard.failed = true;
                    let finished: Vec<W> = guard.slots.drain(..).flatten().collect();
                    drop(guard);
                    log::debug!(
                        "Fan-in failed at part {}: {}; disposing {} completed parts",
                        index,
                        error,
                        finished.len()
                    );
                    finished.dispose();
                    let _ = joined.reject(error);
                }
            }
        });
    }

    joined
}

/// Start one computation per item and join them in input order
pub fn map_list<V, W, F>(items: Vec<V>, mut start: F) -> AsyncResult<Vec<W>>
where
    W: Dispose + Clone + Send + 'static,
    F: FnMut(usize, V) -> AsyncResult<W>,
{
    let parts = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| start(index, item))
        .collect();
    join_list(parts)
}

/// Start one computation per set member and join them into a set
pub fn map_set<V, W, F>(items: HashSet<V>, start: F) -> AsyncResult<HashSet<W>>
where
    W: Dispose + Clone + Eq + Hash + Send + 'static,
    F: FnMut(V) -> AsyncResult<W>,
{
    let parts = items.into_iter().map(start).collect();
    join_list(parts).then(|values| Ok(values.into_iter().collect()))
}

/// Start one computation per map entry and join them under the same keys
pub fn map_map<K, V, W, F>(items: HashMap<K, V>, mut start: F) -> AsyncResult<HashMap<K, W>>
where
    K: Eq + Hash + Clone + Send + 'static,
    W: Dispose + Clone + Send + 'static,
    F: FnMut(&K, V) -> AsyncResult<W>,
{
    let mut keys = Vec::with_capacity(items.len());
    let mut parts = Vec::with_capacity(items.len());
    for (key, value) in items {
        parts.push(start(&key, value));
        keys.push(key);
    }
    join_list(parts).then(move |values| Ok(keys.into_iter().zip(values).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test resource that counts disposals and records them in a shared log
    #[derive(Clone, Debug)]
    struct Resource {
        id: u32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Dispose for Resource {
        fn dispose(self) {
            self.log.lock().unwrap().push(format!("dispose {}", self.id));
        }
    }

    fn resource(id: u32, log: &Arc<Mutex<Vec<String>>>) -> Resource {
        Resource { id, log: Arc::clone(log) }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Plain(u32);
    impl Dispose for Plain {}

    #[test]
    fn test_join_preserves_input_order() {
        let parts: Vec<AsyncResult<Plain>> = (0..4).map(|_| AsyncResult::pending()).collect();
        let joined = join_list(parts.clone());

        // Complete in reverse order
        for (i, part) in parts.iter().enumerate().rev() {
            part.resolve(Plain(i as u32)).unwrap();
        }

        assert_eq!(
            joined.wait().unwrap(),
            vec![Plain(0), Plain(1), Plain(2), Plain(3)]
        );
    }

    #[test]
    fn test_join_empty_resolves_immediately() {
        let joined = join_list::<Plain>(Vec::new());
        assert_eq!(joined.try_get().unwrap().unwrap(), Vec::new());
    }

    #[test]
    fn test_first_error_disposes_completed_then_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let parts: Vec<AsyncResult<Resource>> = (0..5).map(|_| AsyncResult::pending()).collect();
        let joined = join_list(parts.clone());

        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            let log = Arc::clone(&log);
            joined.on_settled(move |outcome| {
                assert!(matches!(outcome, Err(Error::Generation(_))));
                fired.fetch_add(1, Ordering::SeqCst);
                log.lock().unwrap().push("callback".to_string());
            });
        }

        parts[0].resolve(resource(1, &log)).unwrap();
        parts[1].resolve(resource(2, &log)).unwrap();
        parts[2].reject(Error::Generation("part 3".into())).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["dispose 1", "dispose 2", "callback"]
        );

        // Late arrivals are disposed, later errors ignored, callback not re-fired
        parts[3].resolve(resource(4, &log)).unwrap();
        parts[4].reject(Error::Generation("part 5".into())).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries.iter().filter(|e| *e == "dispose 1").count(), 1);
        assert_eq!(entries.iter().filter(|e| *e == "dispose 2").count(), 1);
        assert_eq!(entries.last().unwrap(), "dispose 4");
    }

    #[test]
    fn test_map_list_passes_indices() {
        let joined = map_list(vec![10, 20, 30], |index, item| {
            AsyncResult::resolved(Plain(item + index as u32))
        });
        assert_eq!(joined.wait().unwrap(), vec![Plain(10), Plain(21), Plain(32)]);
    }

    #[test]
    fn test_map_set() {
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        struct Key(u32);
        impl Dispose for Key {}

        let items: HashSet<u32> = [1, 2, 3].into_iter().collect();
        let joined = map_set(items, |v| AsyncResult::resolved(Key(v * 10)));
        let expected: HashSet<Key> = [Key(10), Key(20), Key(30)].into_iter().collect();
        assert_eq!(joined.wait().unwrap(), expected);
    }

    #[test]
    fn test_map_map_keeps_keys() {
        let items: HashMap<&'static str, u32> = [("a", 1), ("b", 2)].into_iter().collect();
        let joined = map_map(items, |key, v| {
            assert!(*key == "a" || *key == "b");
            AsyncResult::resolved(Plain(v * 100))
        });
        let result = joined.wait().unwrap();
        assert_eq!(result["a"], Plain(100));
        assert_eq!(result["b"], Plain(200));
    }

    #[test]
    fn test_map_map_failure_disposes_completed_once() {
        #[derive(Clone)]
        struct Counted(Arc<AtomicUsize>);
        impl Dispose for Counted {
            fn dispose(self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let disposed = Arc::new(AtomicUsize::new(0));
        let parts: Mutex<HashMap<u32, AsyncResult<Counted>>> = Mutex::new(HashMap::new());
        let items: HashMap<u32, ()> = (1..=5).map(|i| (i, ())).collect();
        let joined = map_map(items, |key, _| {
            let part = AsyncResult::pending();
            parts.lock().unwrap().insert(*key, part.clone());
            part
        });
        let parts = parts.into_inner().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let disposed_at_callback = Arc::new(AtomicUsize::new(usize::MAX));
        {
            let fired = Arc::clone(&fired);
            let disposed = Arc::clone(&disposed);
            let snapshot = Arc::clone(&disposed_at_callback);
            joined.on_settled(move |outcome| {
                assert!(matches!(outcome, Err(Error::Generation(_))));
                fired.fetch_add(1, Ordering::SeqCst);
                snapshot.store(disposed.load(Ordering::SeqCst), Ordering::SeqCst);
            });
        }

        parts[&1].resolve(Counted(Arc::clone(&disposed))).unwrap();
        parts[&2].resolve(Counted(Arc::clone(&disposed))).unwrap();
        parts[&3].reject(Error::Generation("3".into())).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(disposed_at_callback.load(Ordering::SeqCst), 2);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);

        parts[&4].resolve(Counted(Arc::clone(&disposed))).unwrap();
        parts[&5].resolve(Counted(Arc::clone(&disposed))).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(disposed.load(Ordering::SeqCst), 4);
        assert!(matches!(joined.wait(), Err(Error::Generation(_))));
    }
}
