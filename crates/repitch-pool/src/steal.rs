//! Notification path from the pool to the owner of a stolen cluster.

use crate::{ClusterPool, OwnerId};
use std::collections::HashMap;

/// Something that owns clusters and must be told, synchronously, when the
/// pool takes one back.
pub trait Stealable {
    /// The cluster at `index` has been reclaimed. The pool has already
    /// unlinked it and cleared its owner; the implementation must bring its
    /// own state back in line before returning, using `pool` to release
    /// anything that became unreachable.
    fn cluster_stolen(&mut self, index: usize, pool: &mut ClusterPool);
}

/// Resolves an [`OwnerId`] to the object that owns the cluster.
pub trait StealableOwners {
    fn stealable(&mut self, owner: OwnerId) -> Option<&mut dyn Stealable>;
}

/// Owner table for allocations that can never steal from anyone
/// (pools with no owned clusters, or callers that only use free clusters).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOwners;

impl StealableOwners for NoOwners {
    fn stealable(&mut self, _owner: OwnerId) -> Option<&mut dyn Stealable> {
        None
    }
}

impl<S: Stealable> StealableOwners for HashMap<OwnerId, S> {
    fn stealable(&mut self, owner: OwnerId) -> Option<&mut dyn Stealable> {
        self.get_mut(&owner).map(|s| s as &mut dyn Stealable)
    }
}
