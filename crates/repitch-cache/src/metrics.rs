//! Cache statistics.
//!
//! Counters are atomics so the audio path can bump them without locking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache and cluster activity.
#[derive(Default)]
pub struct CacheMetrics {
    /// Clusters handed to caches
    clusters_allocated: AtomicU64,
    /// Growth attempts that found nothing free or stealable
    allocation_failures: AtomicU64,
    /// Cache clusters reclaimed by the pool
    clusters_stolen: AtomicU64,
    /// Explicit write cursor rewinds that released clusters
    truncations: AtomicU64,
    /// Lookups that found an existing cache
    cache_hits: AtomicU64,
    /// Lookups that created a cache
    cache_misses: AtomicU64,
    caches_created: AtomicU64,
    caches_destroyed: AtomicU64,
    /// Bytes copied into caches
    bytes_written: AtomicU64,
    /// Bytes copied out of caches
    bytes_read: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_allocation(&self) {
        self.clusters_allocated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_steal(&self) {
        self.clusters_stolen.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_created(&self) {
        self.caches_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_destroyed(&self) {
        self.caches_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take a snapshot of current metrics.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            clusters_allocated: self.clusters_allocated.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            clusters_stolen: self.clusters_stolen.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            caches_created: self.caches_created.load(Ordering::Relaxed),
            caches_destroyed: self.caches_destroyed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        for counter in [
            &self.clusters_allocated,
            &self.allocation_failures,
            &self.clusters_stolen,
            &self.truncations,
            &self.cache_hits,
            &self.cache_misses,
            &self.caches_created,
            &self.caches_destroyed,
            &self.bytes_written,
            &self.bytes_read,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of cache metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub clusters_allocated: u64,
    pub allocation_failures: u64,
    pub clusters_stolen: u64,
    pub truncations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub caches_created: u64,
    pub caches_destroyed: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

impl CacheMetricsSnapshot {
    /// Calculate cache hit rate (0.0 - 1.0).
    ///
    /// Returns 1.0 if no lookups have occurred.
    pub fn cache_hit_rate(&self) -> f32 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            1.0
        } else {
            self.cache_hits as f32 / total as f32
        }
    }

    /// Caches currently alive.
    pub fn live_caches(&self) -> u64 {
        self.caches_created.saturating_sub(self.caches_destroyed)
    }
}
