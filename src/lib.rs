//! # Repitch - Time-stretched / Pitch-shifted Sample Cache
//!
//! Rendered copies of samples at a given pitch and stretch ratio, kept in
//! fixed-size clusters borrowed from a shared pool that may take them back
//! at any time.
//!
//! ## Architecture
//!
//! Repitch is an umbrella crate that coordinates:
//! - **repitch-pool** - Cluster pool (regions, eviction queues, holds, stealing)
//! - **repitch-cache** - Sample caches (write cursor, queue ordering, manager, frame I/O)
//!
//! ## Quick Start
//!
//! ```ignore
//! use repitch::prelude::*;
//!
//! let engine = CacheEngine::builder()
//!     .cluster_size_magnitude(15)
//!     .clusters(256)
//!     .build()?;
//!
//! let sample = Arc::new(Sample::new(SampleId(1), "pad.wav", 2));
//! let id = engine.acquire(&sample, length_bytes, RepitchParams::new(phase_inc, stretch))?;
//!
//! // Background loader renders into the cache
//! engine.loader(|mgr| mgr.write_frames(id, &rendered))?;
//!
//! // Audio callback reads back without blocking
//! let got = engine.try_audio(|mgr| mgr.read_frames(id, pos, &mut out));
//! ```

/// Re-export of repitch-pool for direct access
pub use repitch_pool as pool;

/// Re-export of repitch-cache for direct access
pub use repitch_cache as cache;

pub use repitch_pool::{
    ClusterHold, ClusterId, ClusterPool, ClusterState, ClusterType, FatalReporter,
    InvariantChecks, MemoryRegion, OwnerId, PanicReporter, PoolConfig, PoolStats, RegionConfig,
    Stealable, StealableOwners, StealableQueue, Violation,
};

pub use repitch_cache::{
    CacheConfig, CacheId, CacheKey, CacheMetrics, CacheMetricsSnapshot, RepitchParams, Sample,
    SampleCache, SampleCacheManager, SampleId,
};

mod builder;
mod engine;
mod error;

pub use builder::CacheEngineBuilder;
pub use engine::CacheEngine;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{CacheEngine, CacheEngineBuilder};

    pub use crate::{CacheId, CacheKey, RepitchParams, Sample, SampleCacheManager, SampleId};

    pub use crate::{MemoryRegion, PoolConfig, CacheConfig};

    pub use std::sync::Arc;
}
