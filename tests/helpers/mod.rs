//! Test helpers and fixtures for repitch integration tests
//!
//! Pools are tiny (256-byte clusters) so a few hundred bytes of frames are
//! enough to exhaust them and force stealing.

#![allow(dead_code)]

use repitch::prelude::*;
use repitch::{ClusterId, StealableQueue};
use std::sync::Once;

/// 256-byte clusters
pub const TEST_MAGNITUDE: u8 = 8;
pub const TEST_CLUSTER_SIZE: usize = 1 << TEST_MAGNITUDE;

/// Stereo 16-bit frames
pub const STEREO_16_FRAME: usize = 4;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Strict manager over `clusters` external clusters.
pub fn test_manager(clusters: usize, byte_depth: u8) -> SampleCacheManager {
    init_tracing();
    SampleCacheManager::with_configs(
        PoolConfig::with_clusters(TEST_MAGNITUDE, clusters).strict(true),
        CacheConfig::with_byte_depth(byte_depth),
    )
    .expect("Failed to create test manager")
}

pub fn test_engine(clusters: usize) -> CacheEngine {
    init_tracing();
    CacheEngine::builder()
        .cluster_size_magnitude(TEST_MAGNITUDE)
        .clusters(clusters)
        .byte_depth(2)
        .strict(true)
        .build()
        .expect("Failed to create test engine")
}

pub fn stereo_sample(id: u32) -> Arc<Sample> {
    Arc::new(Sample::new(SampleId(id), format!("/samples/{id}.wav"), 2))
}

pub fn unity() -> RepitchParams {
    RepitchParams::new(RepitchParams::UNITY, RepitchParams::UNITY)
}

/// Deterministic content of the rendered waveform at byte `pos`.
pub fn pattern_byte(seed: u32, pos: usize) -> u8 {
    ((pos as u32).wrapping_mul(31).wrapping_add(seed.wrapping_mul(97)) % 251) as u8
}

pub fn pattern(seed: u32, start: usize, len: usize) -> Vec<u8> {
    (start..start + len).map(|p| pattern_byte(seed, p)).collect()
}

/// Cache-queue contents, head first.
pub fn cache_queue(mgr: &SampleCacheManager) -> Vec<ClusterId> {
    mgr.pool()
        .queue_iter(MemoryRegion::External, StealableQueue::CurrentSongRepitchedCache)
        .collect()
}

/// Every queued cluster `i` of the cache sits closer to the tail than a
/// queued cluster `i - 1`.
pub fn assert_run_ordered(mgr: &SampleCacheManager, id: CacheId) {
    let order = cache_queue(mgr);
    let cache = mgr.cache(id).expect("cache exists");
    let mut previous: Option<usize> = None;
    for i in 0..cache.existing_clusters() {
        let cluster = cache.cluster_at(i).expect("existing cluster present");
        let at = order.iter().position(|&c| c == cluster);
        if let (Some(prev), Some(at)) = (previous, at) {
            assert!(
                at > prev,
                "{id}: cluster {i} at queue position {at}, cluster {} at {prev}",
                i - 1
            );
        }
        previous = at;
    }
}

/// Write cursor, slot and owner bookkeeping of one cache agree with the pool.
pub fn assert_cache_consistent(mgr: &SampleCacheManager, id: CacheId) {
    let cache = mgr.cache(id).expect("cache exists");
    let pool = mgr.pool();
    let pos = cache.write_byte_pos();
    assert_eq!(pos % cache.bytes_per_frame(), 0, "{id}: misaligned cursor {pos}");
    assert!(pos <= cache.waveform_length_bytes());

    let existing = cache.existing_clusters();
    for i in 0..cache.num_clusters() {
        match cache.cluster_at(i) {
            Some(cluster) => {
                assert!(i < existing, "{id}: slot {i} filled past {existing} clusters");
                let owner = pool.owner(cluster).expect("owned cluster");
                assert_eq!(owner.owner, id.owner());
                assert_eq!(owner.index, i);
                if pool.state(cluster).is_held() {
                    assert_eq!(pool.queue_of(cluster), None);
                }
            }
            None => assert!(i >= existing, "{id}: slot {i} empty below {existing}"),
        }
    }
}
