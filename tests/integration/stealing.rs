//! Reclamation integration tests
//!
//! A cache losing clusters to another cache's growth truncates itself to
//! what it can still reach and stays usable.

use repitch::prelude::*;

use crate::helpers::*;

#[test]
fn test_stolen_first_cluster_round_trip() {
    let mut mgr = test_manager(2, 2);
    let a = mgr.acquire(&stereo_sample(1), 1000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 1000, unity()).unwrap();

    mgr.write_frames(a, &pattern(1, 0, 300)).unwrap();
    assert_eq!(mgr.cache(a).unwrap().existing_clusters(), 2);

    // Pool is full; b takes the head of the queue, a's cluster 0.
    mgr.write_frames(b, &pattern(2, 0, 8)).unwrap();

    let cache = mgr.cache(a).unwrap();
    assert_eq!(cache.write_byte_pos() % STEREO_16_FRAME, 0);
    assert!(cache.write_byte_pos() <= 256);
    assert_eq!(cache.existing_clusters(), 0);
    assert_eq!(cache.cluster_at(1), None);
    assert_eq!(mgr.pool().free_count(), 1);
    assert_cache_consistent(&mgr, a);
    assert_cache_consistent(&mgr, b);
    assert_eq!(mgr.metrics().snapshot().clusters_stolen, 1);
}

#[test]
fn test_steal_of_middle_cluster_keeps_prefix() {
    let mut mgr = test_manager(4, 2);
    let a = mgr.acquire(&stereo_sample(1), 2000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 2000, unity()).unwrap();
    mgr.write_frames(a, &pattern(1, 0, 1000)).unwrap();
    assert_eq!(mgr.cache(a).unwrap().existing_clusters(), 4);

    // Pin a's first cluster so the steal has to take cluster 1.
    let hold = mgr.hold_cluster(a, 0).unwrap();
    mgr.write_frames(b, &pattern(2, 0, 40)).unwrap();

    let cache = mgr.cache(a).unwrap();
    assert_eq!(cache.write_byte_pos(), 256);
    assert_eq!(cache.existing_clusters(), 1);
    assert_cache_consistent(&mgr, a);

    let mut out = vec![0u8; 256];
    assert_eq!(mgr.read_frames(a, 0, &mut out).unwrap(), 256);
    assert_eq!(out, pattern(1, 0, 256));
    drop(hold);

    // Rendering resumes from the truncated cursor.
    assert_eq!(mgr.write_frames(a, &pattern(1, 256, 256)).unwrap(), 256);
    let mut out = vec![0u8; 512];
    mgr.read_frames(a, 0, &mut out).unwrap();
    assert_eq!(out, pattern(1, 0, 512));
}

#[test]
fn test_steal_between_growth_calls() {
    let mut mgr = test_manager(3, 2);
    let a = mgr.acquire(&stereo_sample(1), 2000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 2000, unity()).unwrap();

    mgr.write_frames(a, &pattern(1, 0, 512)).unwrap();
    let planned_next = mgr.cache(a).unwrap().existing_clusters();
    assert_eq!(planned_next, 2);

    // b fills the pool and then steals a's cluster 0 between a's growth calls.
    mgr.write_frames(b, &pattern(2, 0, 256)).unwrap();
    mgr.write_frames(b, &pattern(2, 256, 4)).unwrap();

    let existing = mgr.cache(a).unwrap().existing_clusters();
    assert_eq!(existing, 0);
    assert_cache_consistent(&mgr, a);

    // Growth restarts at the new existing count.
    let cluster = mgr.setup_new_cluster(a, existing).unwrap();
    assert_eq!(mgr.cache(a).unwrap().cluster_at(0), Some(cluster));
    assert_cache_consistent(&mgr, b);
}

#[test]
fn test_truncation_releases_clusters_to_other_caches() {
    let mut mgr = test_manager(4, 2);
    let a = mgr.acquire(&stereo_sample(1), 2000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 2000, unity()).unwrap();
    mgr.write_frames(a, &pattern(1, 0, 1024)).unwrap();

    mgr.set_write_byte_pos(a, 100).unwrap();
    assert_eq!(mgr.pool().free_count(), 3);
    assert_eq!(mgr.write_frames(b, &pattern(2, 0, 768)).unwrap(), 768);
    assert_eq!(mgr.cache(a).unwrap().write_byte_pos(), 100);
    assert_eq!(mgr.metrics().snapshot().clusters_stolen, 0);
}

#[test]
fn test_release_of_cache_with_held_cluster_defers_free() {
    let mut mgr = test_manager(2, 2);
    let a = mgr.acquire(&stereo_sample(1), 1000, unity()).unwrap();
    mgr.write_frames(a, &pattern(1, 0, 512)).unwrap();
    let hold = mgr.hold_cluster(a, 1).unwrap();
    let held = hold.cluster();

    assert!(mgr.release(a).unwrap());
    assert!(mgr.pool().state(held).is_held());
    assert_eq!(mgr.pool().free_count(), 1);

    drop(hold);
    mgr.pool_mut().process_releases();
    assert!(mgr.pool().state(held).is_free());
    assert_eq!(mgr.pool().free_count(), 2);
}
