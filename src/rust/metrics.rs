use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of store activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetrics {
    /// Shard files decoded
    pub shard_reads: u64,
    /// Shard files written
    pub shard_writes: u64,
    /// Entities loaded by bulk iteration
    pub entities_loaded: u64,
    /// Entities skipped by bulk iteration because they failed to load
    pub entities_skipped: u64,
    /// Protein lookups answered by the cache
    pub cache_hits: u64,
    /// Protein lookups that had to go to disk
    pub cache_misses: u64,
    /// Underlying Protein loads issued by the cache
    pub protein_loads: u64,
    /// Time since the collector was created
    pub elapsed: Duration,
}

impl StoreMetrics {
    /// Calculate cache hit ratio
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn entities_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() == 0.0 {
            0.0
        } else {
            self.entities_loaded as f64 / self.elapsed.as_secs_f64()
        }
    }
}

/// Thread-safe metrics collector shared by stores, repositories and caches
#[derive(Debug)]
pub struct MetricsCollector {
    shard_reads: AtomicU64,
    shard_writes: AtomicU64,
    entities_loaded: AtomicU64,
    entities_skipped: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    protein_loads: AtomicU64,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            shard_reads: AtomicU64::new(0),
            shard_writes: AtomicU64::new(0),
            entities_loaded: AtomicU64::new(0),
            entities_skipped: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            protein_loads: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_shard_read(&self) {
        self.shard_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shard_write(&self) {
        self.shard_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_loaded(&self) {
        self.entities_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_skipped(&self) {
        self.entities_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protein_load(&self) {
        self.protein_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics
    pub fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            shard_reads: self.shard_reads.load(Ordering::Relaxed),
            shard_writes: self.shard_writes.load(Ordering::Relaxed),
            entities_loaded: self.entities_loaded.load(Ordering::Relaxed),
            entities_skipped: self.entities_skipped.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            protein_loads: self.protein_loads.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
