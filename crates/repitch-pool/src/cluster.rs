//! Cluster slots of the pool arena.

use crate::{ClusterId, ClusterType, MemoryRegion, OwnerId, StealableQueue};
use std::num::NonZeroU32;

/// Where a cluster is in its lifecycle.
///
/// Exactly one of these applies at any time; the pool only moves a cluster
/// between them, never lets two overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    /// On the free list.
    Free,
    /// Allocated but neither queued nor held. A freshly allocated cluster
    /// stays here until its owner queues it, so it cannot be stolen while
    /// still being written.
    Claimed,
    /// Stealable. `prev` is toward the head (stolen sooner), `next` toward the tail.
    Queued {
        queue: StealableQueue,
        prev: Option<ClusterId>,
        next: Option<ClusterId>,
    },
    /// Pinned by one or more [`ClusterHold`](crate::ClusterHold)s.
    Held { reasons: NonZeroU32 },
}

impl ClusterState {
    #[inline]
    pub fn is_free(&self) -> bool {
        matches!(self, ClusterState::Free)
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        matches!(self, ClusterState::Held { .. })
    }

    #[inline]
    pub fn queue(&self) -> Option<StealableQueue> {
        match *self {
            ClusterState::Queued { queue, .. } => Some(queue),
            _ => None,
        }
    }
}

/// Back-reference from a cluster to the slot that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterOwner {
    pub owner: OwnerId,
    pub index: usize,
}

pub(crate) struct Cluster {
    pub(crate) data: Box<[u8]>,
    pub(crate) region: MemoryRegion,
    pub(crate) state: ClusterState,
    pub(crate) kind: Option<ClusterType>,
    pub(crate) owner: Option<ClusterOwner>,
    pub(crate) generation: u32,
    /// Deallocated while held; goes to the free list with its last hold.
    pub(crate) free_on_release: bool,
}

impl Cluster {
    pub(crate) fn new(region: MemoryRegion, bytes: usize) -> Self {
        Self {
            data: vec![0u8; bytes].into_boxed_slice(),
            region,
            state: ClusterState::Free,
            kind: None,
            owner: None,
            generation: 0,
            free_on_release: false,
        }
    }

    #[inline]
    pub(crate) fn links(&self) -> Option<(StealableQueue, Option<ClusterId>, Option<ClusterId>)> {
        match self.state {
            ClusterState::Queued { queue, prev, next } => Some((queue, prev, next)),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn set_prev(&mut self, id: Option<ClusterId>) {
        if let ClusterState::Queued { prev, .. } = &mut self.state {
            *prev = id;
        }
    }

    #[inline]
    pub(crate) fn set_next(&mut self, id: Option<ClusterId>) {
        if let ClusterState::Queued { next, .. } = &mut self.state {
            *next = id;
        }
    }
}
