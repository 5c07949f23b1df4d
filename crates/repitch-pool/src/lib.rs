//! Fixed-size cluster pool with stealable eviction queues.
//!
//! The pool hands out equally sized clusters (a power-of-two byte size plus a
//! small tail) from one or more memory regions. A cluster that is no longer
//! being written or read sits in an eviction queue, where the allocator may
//! steal it at any time; its owner is told synchronously through the
//! [`Stealable`] trait.
//!
//! # Cluster states
//!
//! | State | Stealable | How it gets there |
//! |-------|-----------|-------------------|
//! | `Free` | - | [`ClusterPool::deallocate`] |
//! | `Claimed` | no | [`ClusterPool::allocate`], last hold released then relinked |
//! | `Queued` | yes | [`ClusterPool::move_to_tail`], [`ClusterPool::insert_after`], hold release |
//! | `Held` | no | [`ClusterPool::hold`] |
//!
//! # Example
//!
//! ```ignore
//! use repitch_pool::{ClusterPool, ClusterType, NoOwners, PoolConfig, StealableQueue};
//!
//! let mut pool = ClusterPool::new(PoolConfig::with_clusters(12, 64))?;
//! let id = pool.allocate(ClusterType::Sample, None, &mut NoOwners).unwrap();
//! pool.data_mut(id)[..4].copy_from_slice(&[1, 2, 3, 4]);
//! pool.move_to_tail(StealableQueue::CurrentSongSampleData, id);
//!
//! // Pin it while the audio path reads it.
//! let hold = pool.hold(id);
//! drop(hold);
//! ```

pub mod checks;
pub mod cluster;
pub mod config;
pub mod error;
mod hold;
mod pool;
mod queue;
mod steal;
mod types;

pub use checks::{FatalReporter, InvariantChecks, PanicReporter, Violation};
pub use cluster::{ClusterOwner, ClusterState};
pub use config::{PoolConfig, RegionConfig};
pub use error::{Error, Result};
pub use hold::ClusterHold;
pub use pool::{ClusterPool, PoolStats};
pub use steal::{NoOwners, Stealable, StealableOwners};
pub use types::{ClusterId, ClusterType, MemoryRegion, OwnerId, StealableQueue};
