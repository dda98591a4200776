//! Bulk iteration over stored entities.
//!
//! Keys are enumerated once and handed to a bounded rayon pool one batch at
//! a time. Results are collected in key order, so a slow entity holds back
//! the ones after it but never reorders them. Dropping the iterator stops
//! loading after the batch in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{info, warn};

use crate::cache::ProteinCache;
use crate::config::LoaderConfig;
use crate::consensus::Verdict;
use crate::entity::{AttrPath, Entity};
use crate::errors::{DbError, DbResult};
use crate::metrics::MetricsCollector;
use crate::ppi::{Ppi, PpiAttr};
use crate::protein::Protein;
use crate::repository::Repository;
use crate::types::PpiKey;

/// A PPI together with both of its proteins
#[derive(Debug, Clone)]
pub struct ResolvedPpi {
    pub ppi: Ppi,
    pub p1: Arc<Protein>,
    pub p2: Arc<Protein>,
}

impl ResolvedPpi {
    pub fn verdict(&self) -> DbResult<Verdict> {
        self.ppi.interact()
    }
}

/// Runs entity loads on a bounded pool
#[derive(Clone)]
pub struct BulkLoader {
    pool: Arc<ThreadPool>,
    batch_size: usize,
    metrics: Arc<MetricsCollector>,
}

impl BulkLoader {
    pub fn new(config: &LoaderConfig, metrics: Arc<MetricsCollector>) -> DbResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("ppidb-loader-{}", i))
            .build()
            .map_err(|e| DbError::ConfigurationError {
                field: "workers".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { pool: Arc::new(pool), batch_size: config.batch_size.max(1), metrics })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Load `keys` with `load`, yielding results in the order of `keys`
    pub fn iter<K, T, F>(&self, keys: Vec<K>, load: F) -> BulkIter<K, T, F>
    where
        K: ToString + Sync,
        T: Send,
        F: Fn(&K) -> DbResult<T> + Sync,
    {
        BulkIter {
            pool: Arc::clone(&self.pool),
            total: keys.len(),
            pending: keys.into_iter(),
            batch_size: self.batch_size,
            ready: VecDeque::new(),
            load,
            metrics: Arc::clone(&self.metrics),
            emitted: 0,
            finished: false,
        }
    }

    /// Every stored entity with its core attributes plus `extra`, in key order
    pub fn entities<E: Entity>(
        &self,
        repository: &Repository<E>,
        extra: Vec<AttrPath<E::Attr>>,
    ) -> DbResult<BulkIter<E::Key, E, impl Fn(&E::Key) -> DbResult<E> + Sync>> {
        let keys = repository.enumerate()?;
        let repository = repository.clone();
        Ok(self.iter(keys, move |key| repository.get(key, &extra)))
    }

    /// Every stored PPI with both proteins resolved through `cache`, each
    /// protein carrying the cache's extra attributes. A PPI naming a protein
    /// that is not stored fails with `NotFound`.
    pub fn ppis(
        &self,
        repository: &Repository<Ppi>,
        cache: Arc<ProteinCache>,
        extra: Vec<AttrPath<PpiAttr>>,
    ) -> DbResult<BulkIter<PpiKey, ResolvedPpi, impl Fn(&PpiKey) -> DbResult<ResolvedPpi> + Sync>>
    {
        let keys = repository.enumerate()?;
        let repository = repository.clone();
        Ok(self.iter(keys, move |key| {
            let ppi = repository.get(key, &extra)?;
            let p1 = cache.get(ppi.p1())?;
            let p2 = cache.get(ppi.p2())?;
            Ok(ResolvedPpi { ppi, p1, p2 })
        }))
    }
}

pub struct BulkIter<K, T, F> {
    pool: Arc<ThreadPool>,
    total: usize,
    pending: std::vec::IntoIter<K>,
    batch_size: usize,
    ready: VecDeque<(String, DbResult<T>)>,
    load: F,
    metrics: Arc<MetricsCollector>,
    emitted: usize,
    finished: bool,
}

impl<K, T, F> BulkIter<K, T, F>
where
    K: ToString + Sync,
    T: Send,
    F: Fn(&K) -> DbResult<T> + Sync,
{
    /// Number of keys enumerated for this iteration
    pub fn total(&self) -> usize {
        self.total
    }

    fn fill(&mut self) {
        let batch: Vec<K> = self.pending.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            return;
        }
        let load = &self.load;
        // Indexed collect keeps key order whatever order the loads finish in
        let results: Vec<DbResult<T>> =
            self.pool.install(|| batch.par_iter().map(load).collect());
        self.ready.extend(batch.iter().map(ToString::to_string).zip(results));
    }

    /// Drop entities that fail to load, logging each one
    pub fn skip_failures(self) -> impl Iterator<Item = T> {
        let metrics = Arc::clone(&self.metrics);
        self.keyed().filter_map(move |(key, result)| match result {
            Ok(entity) => Some(entity),
            Err(e) => {
                metrics.record_entity_skipped();
                warn!(key = %key, error = %e, "skipping entity that failed to load");
                None
            }
        })
    }

    /// Results paired with the key they were loaded for
    pub fn keyed(self) -> KeyedBulkIter<K, T, F> {
        KeyedBulkIter { inner: self }
    }

    fn next_keyed(&mut self) -> Option<(String, DbResult<T>)> {
        if self.ready.is_empty() {
            self.fill();
        }
        match self.ready.pop_front() {
            Some((key, result)) => {
                if result.is_ok() {
                    self.metrics.record_entity_loaded();
                }
                self.emitted += 1;
                Some((key, result))
            }
            None => {
                if !self.finished {
                    self.finished = true;
                    info!(entities = self.emitted, "bulk iteration finished");
                }
                None
            }
        }
    }
}

impl<K, T, F> Iterator for BulkIter<K, T, F>
where
    K: ToString + Sync,
    T: Send,
    F: Fn(&K) -> DbResult<T> + Sync,
{
    type Item = DbResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_keyed().map(|(_, result)| result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ready.len() + self.pending.len();
        (remaining, Some(remaining))
    }
}

impl<K, T, F> ExactSizeIterator for BulkIter<K, T, F>
where
    K: ToString + Sync,
    T: Send,
    F: Fn(&K) -> DbResult<T> + Sync,
{
}

/// Iterator over `(key, result)` pairs
pub struct KeyedBulkIter<K, T, F> {
    inner: BulkIter<K, T, F>,
}

impl<K, T, F> Iterator for KeyedBulkIter<K, T, F>
where
    K: ToString + Sync,
    T: Send,
    F: Fn(&K) -> DbResult<T> + Sync,
{
    type Item = (String, DbResult<T>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_keyed()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn loader(workers: usize, batch_size: usize) -> BulkLoader {
        BulkLoader::new(&LoaderConfig { workers, batch_size }, Arc::default()).unwrap()
    }

    #[test]
    fn test_slow_loads_do_not_reorder() {
        let keys: Vec<u64> = (0..40).collect();
        let results: Vec<u64> = loader(8, 16)
            .iter(keys.clone(), |&k| {
                if k % 5 == 0 {
                    thread::sleep(Duration::from_millis(20));
                }
                Ok(k * 10)
            })
            .collect::<DbResult<_>>()
            .unwrap();
        assert_eq!(results, keys.iter().map(|k| k * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_skip_failures_keeps_order_and_counts() {
        let bulk = loader(4, 3);
        let metrics = Arc::clone(&bulk.metrics);
        let kept: Vec<u64> = bulk
            .iter((0..10u64).collect::<Vec<u64>>(), |&k| {
                if k == 3 || k == 7 {
                    Err(DbError::consistency("bad evidence"))
                } else {
                    Ok(k)
                }
            })
            .skip_failures()
            .collect();
        assert_eq!(kept, vec![0, 1, 2, 4, 5, 6, 8, 9]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entities_skipped, 2);
        assert_eq!(snapshot.entities_loaded, 8);
    }

    #[test]
    fn test_dropping_stops_after_batch_in_flight() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let mut iter = loader(2, 4).iter((0..100u64).collect::<Vec<u64>>(), |&k| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(k)
        });
        assert_eq!(iter.len(), 100);
        assert_eq!(iter.next().unwrap().unwrap(), 0);
        drop(iter);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[test]
    fn test_pool_width_follows_config() {
        assert!(BulkLoader::new(&LoaderConfig::default(), Arc::default()).is_ok());
        assert_eq!(loader(3, 1).workers(), 3);
    }
}
