//! CacheEngine that shares the cache manager between the audio path and the loader

use std::sync::Arc;

use parking_lot::Mutex;
use repitch_cache::{CacheId, CacheMetrics, CacheMetricsSnapshot, RepitchParams, Sample, SampleCacheManager};
use repitch_pool::PoolStats;

use crate::Result;

/// Shared handle to the pool and every sample cache.
///
/// The manager is single-writer: all cluster and cache mutation happens
/// under one lock. The real-time audio path only ever uses
/// [`try_audio`](Self::try_audio), which gives up instead of waiting; the
/// background loader uses [`loader`](Self::loader), which blocks.
///
/// # Example
///
/// ```ignore
/// use repitch::prelude::*;
///
/// let engine = CacheEngine::builder().clusters(256).byte_depth(2).build()?;
/// let sample = Arc::new(Sample::new(SampleId(1), "kick.wav", 2));
/// let id = engine.acquire(&sample, 44_100 * 4, RepitchParams::new(UP_A_FIFTH, RepitchParams::UNITY))?;
///
/// // Loader thread
/// engine.loader(|mgr| mgr.write_frames(id, &rendered))?;
///
/// // Audio callback
/// match engine.try_audio(|mgr| mgr.read_frames(id, pos, &mut out)) {
///     Some(Ok(n)) => { /* play n cached bytes */ }
///     _ => { /* render uncached this tick */ }
/// }
/// ```
#[derive(Clone)]
pub struct CacheEngine {
    manager: Arc<Mutex<SampleCacheManager>>,
    metrics: Arc<CacheMetrics>,
}

impl CacheEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::CacheEngineBuilder {
        crate::CacheEngineBuilder::default()
    }

    pub(crate) fn from_manager(manager: SampleCacheManager) -> Self {
        let metrics = Arc::clone(manager.metrics());
        Self {
            manager: Arc::new(Mutex::new(manager)),
            metrics,
        }
    }

    /// Runs `f` on the manager if it is free right now. Never blocks.
    ///
    /// Returns `None` when the loader is holding the manager; the caller
    /// should fall back to uncached rendering for this block.
    pub fn try_audio<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut SampleCacheManager) -> R,
    {
        let Some(mut manager) = self.manager.try_lock() else {
            tracing::trace!("cache manager busy, audio path skipped");
            return None;
        };
        Some(f(&mut manager))
    }

    /// Runs `f` on the manager, waiting for the lock.
    pub fn loader<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SampleCacheManager) -> R,
    {
        f(&mut self.manager.lock())
    }

    /// Looks up or creates the cache for `sample` at `params`.
    pub fn acquire(
        &self,
        sample: &Arc<Sample>,
        waveform_length_bytes: usize,
        params: RepitchParams,
    ) -> Result<CacheId> {
        Ok(self.loader(|mgr| mgr.acquire(sample, waveform_length_bytes, params))?)
    }

    /// Drops one user of a cache; returns whether the cache was destroyed.
    pub fn release(&self, id: CacheId) -> Result<bool> {
        Ok(self.loader(|mgr| mgr.release(id))?)
    }

    /// Destroys every cache.
    pub fn clear(&self) {
        self.loader(SampleCacheManager::clear);
    }

    /// Cache counters. Lock-free.
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Pool occupancy.
    pub fn pool_stats(&self) -> PoolStats {
        self.loader(|mgr| mgr.pool().stats())
    }
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
