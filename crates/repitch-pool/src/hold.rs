//! Pins that keep a cluster out of every eviction queue.

use crate::ClusterId;
use crossbeam_channel::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HoldRelease {
    pub(crate) id: ClusterId,
    pub(crate) generation: u32,
}

/// A "reason to be loaded" on one cluster.
///
/// While any hold exists the cluster cannot be stolen. Dropping the hold is
/// the only way to give the reason back: the drop posts a release message
/// and the pool applies it the next time it is used, re-queueing the cluster
/// once its last hold is gone. A release that arrives after the cluster was
/// freed and reallocated is recognised by its generation and ignored.
#[must_use = "dropping a hold releases the cluster immediately"]
#[derive(Debug)]
pub struct ClusterHold {
    id: ClusterId,
    generation: u32,
    releases: Sender<HoldRelease>,
}

impl ClusterHold {
    pub(crate) fn new(id: ClusterId, generation: u32, releases: Sender<HoldRelease>) -> Self {
        Self {
            id,
            generation,
            releases,
        }
    }

    #[inline]
    pub fn cluster(&self) -> ClusterId {
        self.id
    }
}

impl Drop for ClusterHold {
    fn drop(&mut self) {
        // The pool owns the receiver; if it is gone there is nothing left to release.
        let _ = self.releases.send(HoldRelease {
            id: self.id,
            generation: self.generation,
        });
    }
}
