//! Builder for configuring and constructing a `CacheEngine`.

use std::sync::Arc;

use repitch_cache::{CacheConfig, SampleCacheManager};
use repitch_pool::{ClusterPool, FatalReporter, MemoryRegion, PoolConfig};

use crate::{CacheEngine, Result};

/// Pool and cache settings start from their defaults (32 KiB clusters,
/// 128 external clusters, 24-bit samples). Invariant checks are strict in
/// debug builds unless overridden with [`strict`](Self::strict).
///
/// # Example
///
/// ```ignore
/// use repitch::prelude::*;
///
/// let engine = CacheEngine::builder()
///     .cluster_size_magnitude(12)
///     .clusters(512)
///     .byte_depth(2)
///     .build()?;
/// ```
#[derive(Default)]
pub struct CacheEngineBuilder {
    pool: PoolConfig,
    cache: CacheConfig,
    reporter: Option<Arc<dyn FatalReporter>>,
}

impl CacheEngineBuilder {
    /// Replace the whole pool configuration.
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = config;
        self
    }

    /// Replace the whole cache configuration.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Cluster size as a power of two. Default: 15
    pub fn cluster_size_magnitude(mut self, magnitude: u8) -> Self {
        self.pool.cluster_size_magnitude = magnitude;
        self
    }

    /// Number of external-memory clusters. Default: 128
    pub fn clusters(self, count: usize) -> Self {
        self.region(MemoryRegion::External, count)
    }

    /// Sets the cluster count of one memory region, adding it if missing.
    pub fn region(mut self, region: MemoryRegion, count: usize) -> Self {
        self.pool = self.pool.region(region, count);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.pool = self.pool.strict(strict);
        self
    }

    /// Bytes per stored sample. Default: 3
    pub fn byte_depth(mut self, depth: u8) -> Self {
        self.cache.byte_depth = depth.clamp(1, 4);
        self
    }

    pub fn max_caches(mut self, max: usize) -> Self {
        self.cache = self.cache.max_caches(max);
        self
    }

    /// Route invariant violations somewhere other than a panic.
    pub fn fatal_reporter(mut self, reporter: Arc<dyn FatalReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Result<CacheEngine> {
        let pool = match self.reporter {
            Some(reporter) => ClusterPool::with_reporter(self.pool, reporter)?,
            None => ClusterPool::new(self.pool)?,
        };
        tracing::debug!(
            clusters = pool.capacity(),
            cluster_size = pool.cluster_size(),
            byte_depth = self.cache.byte_depth,
            "cache engine built"
        );
        Ok(CacheEngine::from_manager(SampleCacheManager::new(pool, self.cache)))
    }
}
