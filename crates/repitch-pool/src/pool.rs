//! The cluster pool.
//!
//! One arena of equally sized clusters, partitioned into memory regions.
//! Each region has a free list and one eviction queue per usage class.
//! When nothing is free, [`ClusterPool::allocate`] steals from the queue
//! heads and notifies the previous owner before returning.

use crossbeam_channel::{Receiver, Sender};
use smallvec::SmallVec;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::checks::{FatalReporter, InvariantChecks, Violation};
use crate::cluster::{Cluster, ClusterOwner, ClusterState};
use crate::config::PoolConfig;
use crate::error::Result;
use crate::hold::{ClusterHold, HoldRelease};
use crate::queue::EvictionQueues;
use crate::steal::StealableOwners;
use crate::{ClusterId, ClusterType, MemoryRegion, OwnerId, StealableQueue};

/// Fixed-size cluster allocator with stealable eviction queues.
pub struct ClusterPool {
    clusters: Vec<Cluster>,
    free: [Vec<ClusterId>; MemoryRegion::COUNT],
    queues: [EvictionQueues; MemoryRegion::COUNT],
    magnitude: u8,
    tail_bytes: usize,
    checks: InvariantChecks,
    release_tx: Sender<HoldRelease>,
    release_rx: Receiver<HoldRelease>,
}

impl ClusterPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let checks = InvariantChecks::new(config.strict);
        Self::build(config, checks)
    }

    /// Same as [`new`](Self::new) but with a custom fatal reporter.
    pub fn with_reporter(config: PoolConfig, reporter: Arc<dyn FatalReporter>) -> Result<Self> {
        let checks = InvariantChecks::with_reporter(config.strict, reporter);
        Self::build(config, checks)
    }

    fn build(config: PoolConfig, checks: InvariantChecks) -> Result<Self> {
        config.validate()?;

        let bytes = config.cluster_size() + config.cluster_tail_bytes;
        let mut clusters = Vec::with_capacity(config.total_clusters());
        let mut free: [Vec<ClusterId>; MemoryRegion::COUNT] = Default::default();

        for region in &config.regions {
            let first = clusters.len();
            for _ in 0..region.clusters {
                clusters.push(Cluster::new(region.region, bytes));
            }
            // Reversed so that `pop` hands out the lowest ids first.
            free[region.region.slot()].extend((first..clusters.len()).rev().map(|i| ClusterId(i as u32)));
        }

        let (release_tx, release_rx) = crossbeam_channel::unbounded();

        tracing::debug!(
            clusters = clusters.len(),
            cluster_size = config.cluster_size(),
            strict = checks.is_strict(),
            "cluster pool created"
        );

        Ok(Self {
            clusters,
            free,
            queues: Default::default(),
            magnitude: config.cluster_size_magnitude,
            tail_bytes: config.cluster_tail_bytes,
            checks,
            release_tx,
            release_rx,
        })
    }

    #[inline]
    pub fn cluster_size(&self) -> usize {
        1usize << self.magnitude
    }

    #[inline]
    pub fn cluster_size_magnitude(&self) -> u8 {
        self.magnitude
    }

    /// Bytes past the nominal cluster size that are still writable.
    #[inline]
    pub fn cluster_tail_bytes(&self) -> usize {
        self.tail_bytes
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn checks(&self) -> &InvariantChecks {
        &self.checks
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Allocates a cluster of `kind`, stealing one if nothing is free.
    ///
    /// Clusters owned by `protect` are never stolen by this call. A victim's
    /// owner is notified through `owners` before this returns. The new
    /// cluster is `Claimed`: not queued, not held, no owner.
    ///
    /// Returns `None` when nothing is free and nothing is stealable.
    pub fn allocate(
        &mut self,
        kind: ClusterType,
        protect: Option<OwnerId>,
        owners: &mut dyn StealableOwners,
    ) -> Option<ClusterId> {
        self.process_releases();

        for region in kind.regions() {
            if let Some(id) = self.free[region.slot()].pop() {
                return Some(self.claim(id, kind));
            }
        }

        for queue in StealableQueue::ALL {
            for &region in kind.regions() {
                if let Some(victim) = self.find_victim(region, queue, protect) {
                    self.steal(victim, owners);
                    return Some(self.claim(victim, kind));
                }
            }
        }

        tracing::debug!(?kind, ?protect, "cluster pool exhausted");
        None
    }

    fn find_victim(
        &self,
        region: MemoryRegion,
        queue: StealableQueue,
        protect: Option<OwnerId>,
    ) -> Option<ClusterId> {
        let mut cursor = self.queues[region.slot()].head(queue);
        while let Some(id) = cursor {
            let cluster = &self.clusters[id.index()];
            let protected = match (protect, cluster.owner) {
                (Some(p), Some(o)) => o.owner == p,
                _ => false,
            };
            if !protected {
                return Some(id);
            }
            cursor = cluster.links().and_then(|(_, _, next)| next);
        }
        None
    }

    fn steal(&mut self, victim: ClusterId, owners: &mut dyn StealableOwners) {
        let region = self.clusters[victim.index()].region;
        self.queues[region.slot()].unlink(&mut self.clusters, victim);
        let owner = self.clusters[victim.index()].owner.take();

        tracing::debug!(cluster = %victim, ?owner, "stealing cluster");

        if let Some(ClusterOwner { owner, index }) = owner {
            match owners.stealable(owner) {
                Some(stealable) => stealable.cluster_stolen(index, self),
                None => self.checks.ensure(|| false, Violation::UnknownOwner),
            }
        }
    }

    fn claim(&mut self, id: ClusterId, kind: ClusterType) -> ClusterId {
        let cluster = &mut self.clusters[id.index()];
        cluster.state = ClusterState::Claimed;
        cluster.kind = Some(kind);
        cluster.owner = None;
        cluster.generation = cluster.generation.wrapping_add(1);
        id
    }

    /// Returns a cluster to its region's free list, unlinking it from any queue.
    ///
    /// A held cluster loses its owner at once but only becomes free when its
    /// last hold is released.
    pub fn deallocate(&mut self, id: ClusterId) {
        self.process_releases();

        let cluster = &self.clusters[id.index()];
        let state = cluster.state;
        let pending = cluster.free_on_release;
        self.checks.ensure(
            || !state.is_free() && !pending,
            Violation::DeallocateFreeCluster,
        );
        if state.is_free() || pending {
            return;
        }

        if state.is_held() {
            let cluster = &mut self.clusters[id.index()];
            cluster.owner = None;
            cluster.free_on_release = true;
            tracing::trace!(cluster = %id, "deallocation deferred until released");
            return;
        }

        let region = self.clusters[id.index()].region;
        self.queues[region.slot()].unlink(&mut self.clusters, id);
        self.release_to_free_list(id);
    }

    fn release_to_free_list(&mut self, id: ClusterId) {
        let cluster = &mut self.clusters[id.index()];
        cluster.state = ClusterState::Free;
        cluster.kind = None;
        cluster.owner = None;
        cluster.free_on_release = false;
        self.free[cluster.region.slot()].push(id);
    }

    // -------------------------------------------------------------------------
    // Ownership
    // -------------------------------------------------------------------------

    pub fn set_owner(&mut self, id: ClusterId, owner: OwnerId, index: usize) {
        self.clusters[id.index()].owner = Some(ClusterOwner { owner, index });
    }

    #[inline]
    pub fn owner(&self, id: ClusterId) -> Option<ClusterOwner> {
        self.clusters[id.index()].owner
    }

    // -------------------------------------------------------------------------
    // Queue relinking
    // -------------------------------------------------------------------------

    /// Moves (or inserts) a cluster to the tail of `queue` in its own region.
    pub fn move_to_tail(&mut self, queue: StealableQueue, id: ClusterId) {
        self.process_releases();
        if !self.detach_for_queue(id) {
            return;
        }
        let region = self.clusters[id.index()].region;
        self.queues[region.slot()].push_back(&mut self.clusters, queue, id);
        tracing::trace!(cluster = %id, ?queue, "moved to tail");
    }

    /// Places `id` directly after `anchor` (one step closer to the tail),
    /// in whichever queue `anchor` is in.
    pub fn insert_after(&mut self, anchor: ClusterId, id: ClusterId) {
        self.relink(anchor, id, true);
    }

    /// Places `id` directly before `anchor` (one step closer to the head).
    pub fn insert_before(&mut self, anchor: ClusterId, id: ClusterId) {
        self.relink(anchor, id, false);
    }

    fn relink(&mut self, anchor: ClusterId, id: ClusterId, after: bool) {
        self.process_releases();
        if anchor == id || !self.detach_for_queue(id) {
            return;
        }

        let anchor_region = self.clusters[anchor.index()].region;
        let region = self.clusters[id.index()].region;
        let queues = &mut self.queues[region.slot()];
        let linked = anchor_region == region
            && if after {
                queues.insert_after(&mut self.clusters, anchor, id)
            } else {
                queues.insert_before(&mut self.clusters, anchor, id)
            };

        if linked {
            let expected = Some(anchor);
            let actual = if after {
                self.prev_in_queue(id)
            } else {
                self.next_in_queue(id)
            };
            self.checks
                .ensure(|| actual == expected, Violation::QueueLinkMismatch);
        } else {
            self.checks.ensure(|| false, Violation::QueueInvalidState);
            // Relaxed: keep the cluster stealable rather than leaking it.
            let queue = self.default_queue(id);
            self.queues[region.slot()].push_back(&mut self.clusters, queue, id);
        }
        tracing::trace!(cluster = %id, %anchor, after, "relinked");
    }

    /// Takes a cluster out of its queue without freeing it. Returns the queue
    /// it was in.
    pub fn remove_from_queue(&mut self, id: ClusterId) -> Option<StealableQueue> {
        let region = self.clusters[id.index()].region;
        self.queues[region.slot()].unlink(&mut self.clusters, id)
    }

    /// Unlinks `id` if queued. Returns false (after reporting) if the
    /// cluster is free or held and so may not be queued at all.
    fn detach_for_queue(&mut self, id: ClusterId) -> bool {
        let state = self.clusters[id.index()].state;
        let queueable = matches!(state, ClusterState::Claimed | ClusterState::Queued { .. });
        self.checks.ensure(|| queueable, Violation::QueueInvalidState);
        if !queueable {
            return false;
        }
        self.remove_from_queue(id);
        true
    }

    fn default_queue(&self, id: ClusterId) -> StealableQueue {
        self.clusters[id.index()]
            .kind
            .map(ClusterType::default_queue)
            .unwrap_or(StealableQueue::NoSongSampleData)
    }

    // -------------------------------------------------------------------------
    // Holds
    // -------------------------------------------------------------------------

    /// Pins a cluster, taking it out of its eviction queue.
    pub fn hold(&mut self, id: ClusterId) -> ClusterHold {
        self.process_releases();

        let cluster = &self.clusters[id.index()];
        let state = cluster.state;
        let pending = cluster.free_on_release;
        self.checks
            .ensure(|| !state.is_free() && !pending, Violation::HoldFreeCluster);

        let reasons = match state {
            ClusterState::Held { reasons } => reasons.saturating_add(1),
            _ => {
                self.remove_from_queue(id);
                NonZeroU32::MIN
            }
        };
        let cluster = &mut self.clusters[id.index()];
        cluster.state = ClusterState::Held { reasons };
        ClusterHold::new(id, cluster.generation, self.release_tx.clone())
    }

    /// Number of outstanding holds, counting releases not yet processed.
    pub fn holds(&self, id: ClusterId) -> u32 {
        match self.clusters[id.index()].state {
            ClusterState::Held { reasons } => reasons.get(),
            _ => 0,
        }
    }

    /// Applies every hold release posted since the last call. Mutating pool
    /// operations do this themselves; call it directly to make released
    /// clusters stealable again without doing anything else.
    pub fn process_releases(&mut self) {
        let pending: SmallVec<[HoldRelease; 8]> = self.release_rx.try_iter().collect();
        for release in pending {
            let cluster = &mut self.clusters[release.id.index()];
            if cluster.generation != release.generation {
                continue;
            }
            let ClusterState::Held { reasons } = cluster.state else {
                continue;
            };
            match NonZeroU32::new(reasons.get() - 1) {
                Some(left) => cluster.state = ClusterState::Held { reasons: left },
                None if cluster.free_on_release => self.release_to_free_list(release.id),
                None => {
                    cluster.state = ClusterState::Claimed;
                    let queue = self.default_queue(release.id);
                    let region = self.clusters[release.id.index()].region;
                    self.queues[region.slot()].push_back(&mut self.clusters, queue, release.id);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[inline]
    pub fn state(&self, id: ClusterId) -> ClusterState {
        self.clusters[id.index()].state
    }

    #[inline]
    pub fn region_of(&self, id: ClusterId) -> MemoryRegion {
        self.clusters[id.index()].region
    }

    #[inline]
    pub fn kind(&self, id: ClusterId) -> Option<ClusterType> {
        self.clusters[id.index()].kind
    }

    #[inline]
    pub fn generation(&self, id: ClusterId) -> u32 {
        self.clusters[id.index()].generation
    }

    #[inline]
    pub fn queue_of(&self, id: ClusterId) -> Option<StealableQueue> {
        self.clusters[id.index()].state.queue()
    }

    /// Neighbour one step toward the tail.
    #[inline]
    pub fn next_in_queue(&self, id: ClusterId) -> Option<ClusterId> {
        self.clusters[id.index()].links().and_then(|(_, _, next)| next)
    }

    /// Neighbour one step toward the head.
    #[inline]
    pub fn prev_in_queue(&self, id: ClusterId) -> Option<ClusterId> {
        self.clusters[id.index()].links().and_then(|(_, prev, _)| prev)
    }

    #[inline]
    pub fn is_queue_tail(&self, id: ClusterId) -> bool {
        matches!(self.clusters[id.index()].state, ClusterState::Queued { next: None, .. })
    }

    pub fn queue_head(&self, region: MemoryRegion, queue: StealableQueue) -> Option<ClusterId> {
        self.queues[region.slot()].head(queue)
    }

    pub fn queue_tail(&self, region: MemoryRegion, queue: StealableQueue) -> Option<ClusterId> {
        self.queues[region.slot()].tail(queue)
    }

    pub fn queue_len(&self, region: MemoryRegion, queue: StealableQueue) -> usize {
        self.queues[region.slot()].len(queue)
    }

    /// Clusters of one queue, head (stolen first) to tail.
    pub fn queue_iter(
        &self,
        region: MemoryRegion,
        queue: StealableQueue,
    ) -> impl Iterator<Item = ClusterId> + '_ {
        let mut cursor = self.queue_head(region, queue);
        std::iter::from_fn(move || {
            let id = cursor?;
            cursor = self.next_in_queue(id);
            Some(id)
        })
    }

    /// Cluster bytes, including the tail area.
    #[inline]
    pub fn data(&self, id: ClusterId) -> &[u8] {
        &self.clusters[id.index()].data
    }

    #[inline]
    pub fn data_mut(&mut self, id: ClusterId) -> &mut [u8] {
        &mut self.clusters[id.index()].data
    }

    pub fn free_count(&self) -> usize {
        self.free.iter().map(Vec::len).sum()
    }

    /// Every queue in every region has links that agree with its ends.
    pub fn queues_consistent(&self) -> bool {
        self.queues.iter().all(|q| {
            StealableQueue::ALL
                .iter()
                .all(|&queue| q.is_consistent(&self.clusters, queue))
        })
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total: self.clusters.len(),
            ..Default::default()
        };
        for cluster in &self.clusters {
            match cluster.state {
                ClusterState::Free => stats.free += 1,
                ClusterState::Claimed => stats.claimed += 1,
                ClusterState::Queued { .. } => stats.queued += 1,
                ClusterState::Held { .. } => stats.held += 1,
            }
        }
        for region in [MemoryRegion::Internal, MemoryRegion::External] {
            for queue in StealableQueue::ALL {
                let len = self.queue_len(region, queue);
                if len > 0 {
                    stats.queue_lengths.push((region, queue, len));
                }
            }
        }
        stats
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub free: usize,
    pub claimed: usize,
    pub queued: usize,
    pub held: usize,
    /// Non-empty queues only.
    pub queue_lengths: SmallVec<[(MemoryRegion, StealableQueue, usize); 4]>,
}

impl PoolStats {
    /// Fraction of clusters in use (0.0 - 1.0).
    pub fn fill(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.total - self.free) as f32 / self.total as f32
        }
    }
}
