//! Repitched / time-stretched sample caches.
//!
//! A [`SampleCache`] holds the rendered output of one sample at one pitch and
//! stretch setting, stored across clusters borrowed from a
//! [`ClusterPool`](repitch_pool::ClusterPool). The pool may take any queued
//! cluster back at any time; the cache is told synchronously and truncates
//! itself to the frames it can still reach.
//!
//! [`SampleCacheManager`] owns the pool and the caches, looks caches up by
//! [`CacheKey`], and provides frame-level [`write_frames`] / [`read_frames`].
//!
//! [`write_frames`]: SampleCacheManager::write_frames
//! [`read_frames`]: SampleCacheManager::read_frames

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod sample;

pub use cache::{existent_clusters, CacheId, SampleCache, CACHE_QUEUE};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use manager::SampleCacheManager;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use sample::{CacheKey, RepitchParams, Sample, SampleId};
