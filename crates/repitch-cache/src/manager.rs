//! Owner of the pool and every live cache.
//!
//! Caches live in a slab indexed by [`CacheId`]; the id doubles as the
//! pool-side [`OwnerId`], so the slab is the owner table the pool consults
//! when it steals. A cache that is growing is taken out of its slab entry
//! for the duration of the call, which keeps the pool from ever handing a
//! steal notification back to it.

use std::collections::HashMap;
use std::sync::Arc;

use repitch_pool::{
    ClusterHold, ClusterId, ClusterPool, OwnerId, PoolConfig, Stealable, StealableOwners,
};

use crate::cache::{CacheId, SampleCache};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::metrics::CacheMetrics;
use crate::sample::{CacheKey, RepitchParams, Sample};

struct CacheEntry {
    /// `None` only while the cache is detached for an operation.
    cache: Option<SampleCache>,
    key: CacheKey,
    users: u32,
}

struct CacheSlots {
    entries: Vec<Option<CacheEntry>>,
    metrics: Arc<CacheMetrics>,
}

impl CacheSlots {
    fn entry(&self, id: CacheId) -> Option<&CacheEntry> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    fn entry_mut(&mut self, id: CacheId) -> Option<&mut CacheEntry> {
        self.entries.get_mut(id.0 as usize)?.as_mut()
    }

    fn cache(&self, id: CacheId) -> Option<&SampleCache> {
        self.entry(id)?.cache.as_ref()
    }

    fn take(&mut self, id: CacheId) -> Option<CacheEntry> {
        self.entries.get_mut(id.0 as usize)?.take()
    }

    fn detach(&mut self, id: CacheId) -> Option<SampleCache> {
        self.entry_mut(id)?.cache.take()
    }

    fn attach(&mut self, id: CacheId, cache: SampleCache) {
        if let Some(entry) = self.entry_mut(id) {
            entry.cache = Some(cache);
        }
    }
}

impl StealableOwners for CacheSlots {
    fn stealable(&mut self, owner: OwnerId) -> Option<&mut dyn Stealable> {
        let cache = self
            .entries
            .get_mut(owner.0 as usize)?
            .as_mut()?
            .cache
            .as_mut()?;
        self.metrics.record_steal();
        Some(cache as &mut dyn Stealable)
    }
}

/// Looks up, creates, grows and destroys sample caches over one pool.
pub struct SampleCacheManager {
    pool: ClusterPool,
    slots: CacheSlots,
    free_ids: Vec<u32>,
    index: HashMap<CacheKey, CacheId>,
    config: CacheConfig,
}

impl SampleCacheManager {
    pub fn new(pool: ClusterPool, config: CacheConfig) -> Self {
        Self {
            pool,
            slots: CacheSlots {
                entries: Vec::new(),
                metrics: Arc::new(CacheMetrics::new()),
            },
            free_ids: Vec::new(),
            index: HashMap::new(),
            config,
        }
    }

    /// Builds the pool from `pool_config` as well.
    pub fn with_configs(pool_config: PoolConfig, config: CacheConfig) -> Result<Self> {
        Ok(Self::new(ClusterPool::new(pool_config)?, config))
    }

    pub fn pool(&self) -> &ClusterPool {
        &self.pool
    }

    /// Direct pool access, e.g. for sample-data clusters that share the pool.
    pub fn pool_mut(&mut self) -> &mut ClusterPool {
        &mut self.pool
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.slots.metrics
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of live caches.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn find(&self, key: &CacheKey) -> Option<CacheId> {
        self.index.get(key).copied()
    }

    pub fn cache(&self, id: CacheId) -> Option<&SampleCache> {
        self.slots.cache(id)
    }

    /// Voices currently using the cache.
    pub fn users(&self, id: CacheId) -> u32 {
        self.slots.entry(id).map_or(0, |e| e.users)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Returns the cache for `sample` rendered with `params`, creating it on
    /// first use. Each call adds a user; pair it with [`release`](Self::release).
    pub fn acquire(
        &mut self,
        sample: &Arc<Sample>,
        waveform_length_bytes: usize,
        params: RepitchParams,
    ) -> Result<CacheId> {
        let key = CacheKey::new(sample.id(), params);
        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.slots.entry_mut(id) {
                entry.users += 1;
            }
            self.slots.metrics.record_cache_hit();
            return Ok(id);
        }

        self.slots.metrics.record_cache_miss();
        if self.index.len() >= self.config.max_caches {
            return Err(Error::TooManyCaches(self.config.max_caches));
        }

        let id = CacheId(
            self.free_ids
                .pop()
                .unwrap_or(self.slots.entries.len() as u32),
        );
        let num_clusters = (waveform_length_bytes >> self.pool.cluster_size_magnitude()) + 1;
        let cache = SampleCache::new(
            id,
            Arc::clone(sample),
            num_clusters,
            waveform_length_bytes,
            params,
            self.config.byte_depth,
            &self.pool,
        );
        let cache = match cache {
            Ok(cache) => cache,
            Err(e) => {
                // Id was never handed out.
                if (id.0 as usize) < self.slots.entries.len() {
                    self.free_ids.push(id.0);
                }
                return Err(e);
            }
        };

        let entry = CacheEntry {
            cache: Some(cache),
            key,
            users: 1,
        };
        match self.slots.entries.get_mut(id.0 as usize) {
            Some(slot) => *slot = Some(entry),
            None => self.slots.entries.push(Some(entry)),
        }
        self.index.insert(key, id);
        self.slots.metrics.record_created();

        tracing::debug!(
            cache = %id,
            sample = ?key.sample,
            waveform_length_bytes,
            num_clusters,
            "sample cache created"
        );
        Ok(id)
    }

    /// Drops one user. The cache is destroyed with its last user; returns
    /// whether that happened.
    pub fn release(&mut self, id: CacheId) -> Result<bool> {
        let entry = self.slots.entry_mut(id).ok_or(Error::CacheNotFound(id))?;
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return Ok(false);
        }
        self.remove(id)?;
        Ok(true)
    }

    /// Destroys a cache regardless of users, returning its clusters.
    pub fn remove(&mut self, id: CacheId) -> Result<()> {
        let entry = self.slots.take(id).ok_or(Error::CacheNotFound(id))?;
        self.index.remove(&entry.key);
        self.retire(id, entry);
        Ok(())
    }

    fn retire(&mut self, id: CacheId, entry: CacheEntry) {
        if let Some(cache) = entry.cache {
            cache.destroy(&mut self.pool);
        }
        self.free_ids.push(id.0);
        self.slots.metrics.record_destroyed();
    }

    /// Destroys every cache.
    pub fn clear(&mut self) {
        for (_, id) in std::mem::take(&mut self.index) {
            if let Some(entry) = self.slots.take(id) {
                self.retire(id, entry);
            }
        }
        tracing::debug!(free = self.pool.free_count(), "all sample caches cleared");
    }

    // -------------------------------------------------------------------------
    // Cluster access
    // -------------------------------------------------------------------------

    /// Runs `f` with the cache taken out of the owner table, so allocations
    /// made by `f` can steal from every other cache but never this one.
    fn with_cache<R>(
        &mut self,
        id: CacheId,
        f: impl FnOnce(&mut SampleCache, &mut ClusterPool, &mut CacheSlots) -> R,
    ) -> Result<R> {
        let mut cache = self.slots.detach(id).ok_or(Error::CacheNotFound(id))?;
        let out = f(&mut cache, &mut self.pool, &mut self.slots);
        self.slots.attach(id, cache);
        Ok(out)
    }

    /// Allocates cluster `index` of a cache. See [`SampleCache::setup_new_cluster`].
    pub fn setup_new_cluster(&mut self, id: CacheId, index: usize) -> Result<ClusterId> {
        self.with_cache(id, |cache, pool, slots| {
            let result = cache.setup_new_cluster(index, pool, &mut *slots);
            match result {
                Ok(_) => slots.metrics.record_allocation(),
                Err(_) => slots.metrics.record_allocation_failure(),
            }
            result
        })?
    }

    /// Returns cluster `index`, refreshing its place in the eviction queue.
    pub fn get_cluster(&mut self, id: CacheId, index: usize) -> Result<ClusterId> {
        let cache = self.slots.cache(id).ok_or(Error::CacheNotFound(id))?;
        let cluster = cache
            .cluster_at(index)
            .ok_or(Error::ClusterMissing { index })?;
        touch(cache, index, &mut self.pool);
        Ok(cluster)
    }

    /// Pins cluster `index` until the returned guard is dropped.
    pub fn hold_cluster(&mut self, id: CacheId, index: usize) -> Result<ClusterHold> {
        let cache = self.slots.cache(id).ok_or(Error::CacheNotFound(id))?;
        let cluster = cache
            .cluster_at(index)
            .ok_or(Error::ClusterMissing { index })?;
        Ok(self.pool.hold(cluster))
    }

    /// Moves a cache's write cursor, releasing clusters past it.
    pub fn set_write_byte_pos(&mut self, id: CacheId, pos: usize) -> Result<()> {
        self.with_cache(id, |cache, pool, slots| {
            let bytes_per_frame = cache.bytes_per_frame();
            if pos % bytes_per_frame != 0 {
                return Err(Error::MisalignedFrames {
                    len: pos,
                    bytes_per_frame,
                });
            }
            let before = cache.existing_clusters();
            cache.set_write_byte_pos(pos, pool);
            if cache.existing_clusters() < before {
                slots.metrics.record_truncation();
                tracing::debug!(cache = %cache.id(), pos, before, "cache truncated");
            }
            Ok(())
        })?
    }

    // -------------------------------------------------------------------------
    // Frame I/O
    // -------------------------------------------------------------------------

    /// Appends whole frames at the write cursor, growing the cache as needed.
    ///
    /// Stops early when the waveform is complete or no cluster can be had,
    /// and returns the number of bytes actually appended. Each frame is
    /// stored in the cluster it starts in, spilling into the cluster tail.
    pub fn write_frames(&mut self, id: CacheId, bytes: &[u8]) -> Result<usize> {
        self.with_cache(id, |cache, pool, slots| {
            let bytes_per_frame = cache.bytes_per_frame();
            if bytes.len() % bytes_per_frame != 0 {
                return Err(Error::MisalignedFrames {
                    len: bytes.len(),
                    bytes_per_frame,
                });
            }

            let size = pool.cluster_size();
            let magnitude = pool.cluster_size_magnitude();
            let mut written = 0;

            while written < bytes.len() {
                let pos = cache.write_byte_pos();
                let room = cache.waveform_length_bytes().saturating_sub(pos) / bytes_per_frame
                    * bytes_per_frame;
                if room == 0 {
                    break;
                }

                let index = pos >> magnitude;
                let offset = pos & (size - 1);
                if cache.cluster_at(index).is_none() {
                    match cache.setup_new_cluster(index, pool, &mut *slots) {
                        Ok(_) => slots.metrics.record_allocation(),
                        Err(Error::ClusterUnavailable { .. }) => {
                            slots.metrics.record_allocation_failure();
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                let cluster = cache
                    .cluster_at(index)
                    .ok_or(Error::ClusterMissing { index })?;

                let starting_here = (size - offset).div_ceil(bytes_per_frame) * bytes_per_frame;
                let n = starting_here.min(room).min(bytes.len() - written);
                pool.data_mut(cluster)[offset..offset + n]
                    .copy_from_slice(&bytes[written..written + n]);

                cache.set_write_byte_pos(pos + n, pool);
                touch(cache, index, pool);
                written += n;
            }

            slots.metrics.record_write(written as u64);
            Ok(written)
        })?
    }

    /// Copies whole frames starting at `byte_pos` into `out`, up to the
    /// write cursor. Returns the number of bytes copied.
    pub fn read_frames(&mut self, id: CacheId, byte_pos: usize, out: &mut [u8]) -> Result<usize> {
        let cache = self.slots.cache(id).ok_or(Error::CacheNotFound(id))?;
        let bytes_per_frame = cache.bytes_per_frame();
        for len in [byte_pos, out.len()] {
            if len % bytes_per_frame != 0 {
                return Err(Error::MisalignedFrames {
                    len,
                    bytes_per_frame,
                });
            }
        }

        let size = self.pool.cluster_size();
        let magnitude = self.pool.cluster_size_magnitude();
        let end = (byte_pos + out.len()).min(cache.write_byte_pos());
        let mut pos = byte_pos;

        while pos < end {
            let index = pos >> magnitude;
            let offset = pos & (size - 1);
            let cluster = cache
                .cluster_at(index)
                .ok_or(Error::ClusterMissing { index })?;
            touch(cache, index, &mut self.pool);

            let starting_here = (size - offset).div_ceil(bytes_per_frame) * bytes_per_frame;
            let n = starting_here.min(end - pos);
            let read = pos - byte_pos;
            out[read..read + n].copy_from_slice(&self.pool.data(cluster)[offset..offset + n]);
            pos += n;
        }

        let read = end.saturating_sub(byte_pos);
        self.slots.metrics.record_read(read as u64);
        Ok(read)
    }
}

impl std::fmt::Debug for SampleCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCacheManager")
            .field("caches", &self.index.len())
            .field("free_clusters", &self.pool.free_count())
            .field("config", &self.config)
            .finish()
    }
}

/// Refreshes a cluster's queue position unless something holds it.
fn touch(cache: &SampleCache, index: usize, pool: &mut ClusterPool) {
    pool.process_releases();
    let held = cache.cluster_at(index).is_some_and(|id| pool.holds(id) > 0);
    if !held {
        cache.prioritize_not_stealing_cluster(index, pool);
    }
}
