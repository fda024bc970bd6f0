//! Per-result-set cache of aggregate statistics.

use crate::{Error, ResultSetId, StatsBundle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

type Slot = Arc<Mutex<Option<Arc<StatsBundle>>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bundles are computed once per result set and kept for the life of the
/// cache. Result sets are immutable once ingested, so nothing expires; call
/// [`StatsCache::invalidate`] after re-ingesting a date.
#[derive(Default)]
pub struct StatsCache {
    slots: Mutex<HashMap<ResultSetId, Slot>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached bundle for `id`, running `compute` on a miss.
    ///
    /// Concurrent misses on the same id wait for a single computation;
    /// other ids are not blocked. A failed computation is not cached.
    pub fn get_or_compute<F>(&self, id: ResultSetId, compute: F) -> Result<Arc<StatsBundle>, Error>
    where
        F: FnOnce(ResultSetId) -> anyhow::Result<StatsBundle>,
    {
        let slot = lock(&self.slots).entry(id).or_default().clone();
        let mut guard = lock(&slot);
        if let Some(stats) = guard.as_ref() {
            trace!(result_set = id, "stats cache hit");
            return Ok(stats.clone());
        }
        debug!(result_set = id, "computing stats");
        let stats = Arc::new(compute(id)?);
        *guard = Some(stats.clone());
        Ok(stats)
    }

    pub fn get(&self, id: ResultSetId) -> Option<Arc<StatsBundle>> {
        let slot = lock(&self.slots).get(&id)?.clone();
        let stats = lock(&slot).clone();
        stats
    }

    /// Number of result sets with a computed bundle.
    pub fn len(&self) -> usize {
        lock(&self.slots).values().filter(|s| lock(s).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the bundle for `id`. Returns whether one was cached.
    pub fn invalidate(&self, id: ResultSetId) -> bool {
        let Some(slot) = lock(&self.slots).remove(&id) else {
            return false;
        };
        let cached = lock(&slot).is_some();
        cached
    }

    pub fn clear(&self) {
        lock(&self.slots).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, RecordStore, ResultDate, ScanRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn store_with_gquic(flags: &[bool]) -> (MemoryStore, ResultSetId) {
        let store = MemoryStore::new();
        let scans = flags
            .iter()
            .enumerate()
            .map(|(i, &g)| ScanRecord { url: format!("https://{i}.example"), advertise_gquic: g, ..Default::default() })
            .collect();
        let rs = store.insert_result_set(ResultDate::from_key(20180101).unwrap(), scans).unwrap();
        (store, rs.id)
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let (store, id) = store_with_gquic(&[true, true, false]);
        let cache = StatsCache::new();
        let first = cache.get_or_compute(id, |id| store.aggregate_stats(id)).unwrap();
        let second = cache.get_or_compute(id, |id| store.aggregate_stats(id)).unwrap();
        assert_eq!(first.gquic_advertisements, 2);
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.aggregate_calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failure_is_not_cached() {
        let cache = StatsCache::new();
        let err = cache.get_or_compute(1, |_| Err(anyhow::anyhow!("store unavailable"))).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());

        let stats = cache.get_or_compute(1, |_| Ok(StatsBundle::default())).unwrap();
        assert_eq!(*stats, StatsBundle::default());
        assert!(cache.get(1).is_some());
    }

    #[test]
    fn invalidate_forces_recompute() {
        let (store, id) = store_with_gquic(&[true]);
        let cache = StatsCache::new();
        cache.get_or_compute(id, |id| store.aggregate_stats(id)).unwrap();
        assert!(cache.invalidate(id));
        assert!(!cache.invalidate(id));
        cache.get_or_compute(id, |id| store.aggregate_stats(id)).unwrap();
        assert_eq!(store.aggregate_calls(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_misses_compute_once() {
        let cache = StatsCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_compute(7, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(StatsBundle { ipv6_supports: 3, ..Default::default() })
                        })
                        .unwrap()
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(7).unwrap().ipv6_supports, 3);
    }
}
