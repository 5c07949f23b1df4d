//! Intrusive eviction queues over the cluster arena.
//!
//! Links live inside each cluster's `Queued` state, so every operation is
//! O(1) index surgery. The head is stolen first.

use crate::cluster::{Cluster, ClusterState};
use crate::{ClusterId, StealableQueue};

#[derive(Debug, Default, Clone, Copy)]
struct QueueEnds {
    head: Option<ClusterId>,
    tail: Option<ClusterId>,
    len: usize,
}

/// Heads and tails of every usage-class queue in one memory region.
#[derive(Debug, Default)]
pub(crate) struct EvictionQueues {
    ends: [QueueEnds; StealableQueue::COUNT],
}

impl EvictionQueues {
    #[inline]
    pub(crate) fn head(&self, queue: StealableQueue) -> Option<ClusterId> {
        self.ends[queue.slot()].head
    }

    #[inline]
    pub(crate) fn tail(&self, queue: StealableQueue) -> Option<ClusterId> {
        self.ends[queue.slot()].tail
    }

    #[inline]
    pub(crate) fn len(&self, queue: StealableQueue) -> usize {
        self.ends[queue.slot()].len
    }

    /// Appends a detached cluster at the tail.
    pub(crate) fn push_back(&mut self, clusters: &mut [Cluster], queue: StealableQueue, id: ClusterId) {
        let ends = &mut self.ends[queue.slot()];
        let old_tail = ends.tail;
        clusters[id.index()].state = ClusterState::Queued {
            queue,
            prev: old_tail,
            next: None,
        };
        match old_tail {
            Some(t) => clusters[t.index()].set_next(Some(id)),
            None => ends.head = Some(id),
        }
        ends.tail = Some(id);
        ends.len += 1;
    }

    /// Inserts a detached cluster directly after `anchor` (one step toward the tail).
    pub(crate) fn insert_after(&mut self, clusters: &mut [Cluster], anchor: ClusterId, id: ClusterId) -> bool {
        let Some((queue, _, after)) = clusters[anchor.index()].links() else {
            return false;
        };
        clusters[id.index()].state = ClusterState::Queued {
            queue,
            prev: Some(anchor),
            next: after,
        };
        clusters[anchor.index()].set_next(Some(id));
        let ends = &mut self.ends[queue.slot()];
        match after {
            Some(n) => clusters[n.index()].set_prev(Some(id)),
            None => ends.tail = Some(id),
        }
        ends.len += 1;
        true
    }

    /// Inserts a detached cluster directly before `anchor` (one step toward the head).
    pub(crate) fn insert_before(&mut self, clusters: &mut [Cluster], anchor: ClusterId, id: ClusterId) -> bool {
        let Some((queue, before, _)) = clusters[anchor.index()].links() else {
            return false;
        };
        clusters[id.index()].state = ClusterState::Queued {
            queue,
            prev: before,
            next: Some(anchor),
        };
        clusters[anchor.index()].set_prev(Some(id));
        let ends = &mut self.ends[queue.slot()];
        match before {
            Some(p) => clusters[p.index()].set_next(Some(id)),
            None => ends.head = Some(id),
        }
        ends.len += 1;
        true
    }

    /// Detaches a queued cluster, leaving it `Claimed`. Returns the queue it
    /// was in, or `None` if it was not queued.
    pub(crate) fn unlink(&mut self, clusters: &mut [Cluster], id: ClusterId) -> Option<StealableQueue> {
        let (queue, prev, next) = clusters[id.index()].links()?;
        let ends = &mut self.ends[queue.slot()];
        match prev {
            Some(p) => clusters[p.index()].set_next(next),
            None => ends.head = next,
        }
        match next {
            Some(n) => clusters[n.index()].set_prev(prev),
            None => ends.tail = prev,
        }
        ends.len -= 1;
        clusters[id.index()].state = ClusterState::Claimed;
        Some(queue)
    }

    /// Walks `queue` from head to tail and checks every link agrees with its neighbours.
    pub(crate) fn is_consistent(&self, clusters: &[Cluster], queue: StealableQueue) -> bool {
        let ends = &self.ends[queue.slot()];
        let mut prev = None;
        let mut cursor = ends.head;
        let mut count = 0;
        while let Some(id) = cursor {
            let Some((q, p, n)) = clusters[id.index()].links() else {
                return false;
            };
            if q != queue || p != prev {
                return false;
            }
            count += 1;
            if count > clusters.len() {
                return false;
            }
            prev = Some(id);
            cursor = n;
        }
        prev == ends.tail && count == ends.len
    }
}
