//! A single repitched / time-stretched waveform cache.
//!
//! The rendered waveform is stored contiguously from its start across pool
//! clusters. `write_byte_pos` says how many bytes are valid, and the number
//! of clusters that exist is derived from it alone (see
//! [`existent_clusters`]). A frame that starts inside a cluster is stored
//! whole in that cluster, spilling into the cluster's tail bytes if needed,
//! which is why a cluster may be "full" `bytes_per_frame - 1` bytes before
//! the next one has to exist.
//!
//! Cache clusters sit in the [`CACHE_QUEUE`] eviction queue as one
//! contiguous run, cluster 0 nearest the head and each later cluster one
//! step closer to the tail.

use std::fmt;
use std::sync::Arc;

use repitch_pool::{
    ClusterId, ClusterPool, ClusterType, InvariantChecks, MemoryRegion, OwnerId, Stealable,
    StealableOwners, StealableQueue, Violation,
};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::sample::{CacheKey, RepitchParams, Sample};

/// Queue every cache cluster lives in while stealable.
pub const CACHE_QUEUE: StealableQueue = StealableQueue::CurrentSongRepitchedCache;

/// Handle of a cache inside a [`SampleCacheManager`](crate::SampleCacheManager).
/// Doubles as the cache's owner id in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(pub(crate) u32);

impl CacheId {
    #[inline]
    pub fn owner(self) -> OwnerId {
        OwnerId(self.0)
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache#{}", self.0)
    }
}

/// Number of clusters that must exist for `write_pos` valid bytes.
///
/// `(write_pos + cluster_size - bytes_per_frame) >> magnitude`, i.e. the
/// last cluster only becomes necessary once a frame starts inside it.
#[inline]
pub fn existent_clusters(write_pos: usize, bytes_per_frame: usize, magnitude: u8) -> usize {
    (write_pos + (1usize << magnitude)).saturating_sub(bytes_per_frame) >> magnitude
}

/// Rendered waveform of one sample at one set of [`RepitchParams`].
pub struct SampleCache {
    id: CacheId,
    sample: Arc<Sample>,
    params: RepitchParams,
    write_byte_pos: usize,
    waveform_length_bytes: usize,
    num_clusters: usize,
    clusters: SmallVec<[Option<ClusterId>; 8]>,
    bytes_per_frame: usize,
    magnitude: u8,
    checks: InvariantChecks,
}

impl fmt::Debug for SampleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleCache")
            .field("id", &self.id)
            .field("sample", &self.sample.id())
            .field("params", &self.params)
            .field("write_byte_pos", &self.write_byte_pos)
            .field("waveform_length_bytes", &self.waveform_length_bytes)
            .field("existing", &self.existing_clusters())
            .finish()
    }
}

impl SampleCache {
    /// Creates an empty cache. No clusters are allocated until the first
    /// [`setup_new_cluster`](Self::setup_new_cluster).
    ///
    /// `num_clusters` bounds how many clusters the waveform may ever need;
    /// `byte_depth` is the stored sample width in bytes.
    pub fn new(
        id: CacheId,
        sample: Arc<Sample>,
        num_clusters: usize,
        waveform_length_bytes: usize,
        params: RepitchParams,
        byte_depth: u8,
        pool: &ClusterPool,
    ) -> Result<Self> {
        if sample.num_channels() == 0 {
            return Err(Error::NoChannels);
        }
        let bytes_per_frame = sample.num_channels() as usize * byte_depth.max(1) as usize;
        if bytes_per_frame - 1 > pool.cluster_tail_bytes() {
            return Err(Error::FrameTooWide {
                bytes_per_frame,
                needed: bytes_per_frame - 1,
            });
        }

        Ok(Self {
            id,
            sample,
            params,
            write_byte_pos: 0,
            waveform_length_bytes,
            num_clusters,
            clusters: smallvec::smallvec![None; num_clusters],
            bytes_per_frame,
            magnitude: pool.cluster_size_magnitude(),
            checks: pool.checks().clone(),
        })
    }

    #[inline]
    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn sample(&self) -> &Arc<Sample> {
        &self.sample
    }

    pub fn params(&self) -> RepitchParams {
        self.params
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.sample.id(), self.params)
    }

    #[inline]
    pub fn write_byte_pos(&self) -> usize {
        self.write_byte_pos
    }

    #[inline]
    pub fn waveform_length_bytes(&self) -> usize {
        self.waveform_length_bytes
    }

    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    /// Declared upper bound on clusters.
    #[inline]
    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// Whether the whole waveform has been rendered.
    pub fn is_complete(&self) -> bool {
        self.waveform_length_bytes.saturating_sub(self.write_byte_pos) < self.bytes_per_frame
    }

    /// Cluster in slot `index`, without touching queue order.
    pub fn cluster_at(&self, index: usize) -> Option<ClusterId> {
        self.clusters.get(index).copied().flatten()
    }

    /// Clusters that exist at `write_pos`.
    pub fn num_existent_clusters(&self, write_pos: usize) -> usize {
        let n = existent_clusters(write_pos, self.bytes_per_frame, self.magnitude);
        self.checks
            .ensure(|| n <= self.num_clusters, Violation::ExistenceBeyondDeclared);
        n
    }

    #[inline]
    pub fn existing_clusters(&self) -> usize {
        self.num_existent_clusters(self.write_byte_pos)
    }

    /// Returns cluster `index`, first moving it into its place in the cache
    /// queue so it is not stolen soon.
    pub fn get_cluster(&self, index: usize, pool: &mut ClusterPool) -> Option<ClusterId> {
        self.prioritize_not_stealing_cluster(index, pool);
        self.cluster_at(index)
    }

    /// Allocates cluster `index`, which must be the next one after the
    /// existing clusters.
    ///
    /// The new cluster is not queued yet; the caller writes into it and then
    /// calls [`get_cluster`](Self::get_cluster), which queues it. Other
    /// caches may lose clusters to this allocation, this one never does.
    pub fn setup_new_cluster(
        &mut self,
        index: usize,
        pool: &mut ClusterPool,
        owners: &mut dyn StealableOwners,
    ) -> Result<ClusterId> {
        self.checks
            .ensure(|| index < self.num_clusters, Violation::SetupBeyondDeclared);
        self.checks.ensure(
            || index == self.existing_clusters(),
            Violation::SetupOutOfSequence,
        );

        let Some(id) = pool.allocate(ClusterType::SampleCache, Some(self.id.owner()), owners)
        else {
            tracing::debug!(cache = %self.id, index, "cache cluster allocation failed");
            return Err(Error::ClusterUnavailable { index });
        };

        pool.set_owner(id, self.id.owner(), index);
        self.clusters[index] = Some(id);
        Ok(id)
    }

    /// Keeps this cache's clusters as one run near the tail of [`CACHE_QUEUE`],
    /// earliest cluster nearest the head.
    ///
    /// Cluster 0 goes to the tail unless it already is the tail. Any later
    /// cluster goes directly after its predecessor, so one ascending playback
    /// pass carries the whole run behind every other cache. Each call is O(1)
    /// and relinks only when the position is wrong.
    pub fn prioritize_not_stealing_cluster(&self, index: usize, pool: &mut ClusterPool) {
        pool.process_releases();

        let Some(id) = self.cluster_at(index) else {
            self.checks.ensure(|| false, Violation::MissingCluster);
            return;
        };
        if pool.region_of(id) != MemoryRegion::External {
            self.checks.ensure(|| false, Violation::ClusterNotExternal);
            return;
        }
        self.checks
            .ensure(|| pool.holds(id) == 0, Violation::PrioritizeHeldCluster);
        if pool.holds(id) != 0 {
            return;
        }

        if index == 0 {
            if pool.queue_of(id) != Some(CACHE_QUEUE) || !pool.is_queue_tail(id) {
                pool.move_to_tail(CACHE_QUEUE, id);
            }
            return;
        }

        let Some(prev) = self.cluster_at(index - 1) else {
            self.checks.ensure(|| false, Violation::MissingCluster);
            return;
        };
        if pool.region_of(prev) != MemoryRegion::External {
            self.checks.ensure(|| false, Violation::PredecessorNotExternal);
            return;
        }

        if pool.queue_of(prev) != Some(CACHE_QUEUE) {
            // Predecessor is pinned; it rejoins at the tail when released.
            if pool.queue_of(id) != Some(CACHE_QUEUE) || !pool.is_queue_tail(id) {
                pool.move_to_tail(CACHE_QUEUE, id);
            }
        } else if pool.queue_of(id) != Some(CACHE_QUEUE) || pool.prev_in_queue(id) != Some(prev) {
            pool.insert_after(prev, id);
        }
    }

    /// Moves the write cursor. Shrinking releases every cluster past the new end;
    /// growing keeps a cluster that was set up ahead of the cursor.
    ///
    /// `new_pos` must be frame aligned and within the waveform.
    pub fn set_write_byte_pos(&mut self, new_pos: usize, pool: &mut ClusterPool) {
        self.checks.ensure(
            || new_pos <= self.waveform_length_bytes,
            Violation::WritePosBeyondCapacity,
        );
        self.checks.ensure(
            || new_pos % self.bytes_per_frame == 0,
            Violation::WritePosMisaligned,
        );

        let existing = self.num_existent_clusters(new_pos);
        self.checks.ensure(
            || existing == 0 || self.cluster_at(existing - 1).is_some(),
            Violation::MissingCluster,
        );
        if existing < self.existing_clusters() {
            self.unlink_clusters(existing, false, pool);
        }
        self.write_byte_pos = new_pos;

        self.checks.ensure(
            || self.existing_clusters() == existing,
            Violation::TruncateExistenceMismatch,
        );
    }

    /// Returns every cluster from `start` onwards to the pool, including one
    /// set up but not yet reached by the write cursor. Slots are cleared
    /// unless the cache is being destroyed.
    pub fn unlink_clusters(&mut self, start: usize, being_destroyed: bool, pool: &mut ClusterPool) {
        let existing = self.existing_clusters();
        for i in start..self.clusters.len() {
            let slot = self.clusters[i];
            if i < existing {
                self.checks.ensure(|| slot.is_some(), Violation::MissingCluster);
            }
            let Some(id) = slot else { continue };
            pool.deallocate(id);
            if !being_destroyed {
                self.clusters[i] = None;
            }
        }
    }

    /// Releases every cluster. The cache is unusable afterwards.
    pub fn destroy(mut self, pool: &mut ClusterPool) {
        tracing::debug!(cache = %self.id, existing = self.existing_clusters(), "destroying cache");
        self.unlink_clusters(0, true, pool);
    }
}

impl Stealable for SampleCache {
    /// Everything after the stolen cluster becomes unreachable, so it is
    /// released and the cursor is pulled back to the start of the stolen
    /// cluster, rounded up to a whole frame.
    fn cluster_stolen(&mut self, index: usize, pool: &mut ClusterPool) {
        self.checks
            .ensure(|| index < self.num_clusters, Violation::StolenIndexOutOfRange);

        tracing::debug!(cache = %self.id, index, "cache cluster stolen");

        // Must happen before the cursor moves: it counts from the old cursor.
        self.unlink_clusters(index + 1, false, pool);

        let bpf = self.bytes_per_frame;
        self.write_byte_pos = ((index << self.magnitude) + bpf - 1) / bpf * bpf;

        self.checks.ensure(
            || self.write_byte_pos < self.waveform_length_bytes,
            Violation::StolenWritePosOutOfRange,
        );
        self.checks.ensure(
            || self.existing_clusters() == index,
            Violation::StolenExistenceMismatch,
        );

        // The pool already unlinked this one; just forget it.
        if let Some(slot) = self.clusters.get_mut(index) {
            *slot = None;
        }
    }
}
