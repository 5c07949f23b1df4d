//! Eviction queue ordering tests
//!
//! Each cache's clusters form a run in the cache queue, earliest cluster
//! nearest the head, so reclamation eats caches from the front.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use repitch::prelude::*;

use crate::helpers::*;

fn grow(mgr: &mut SampleCacheManager, id: CacheId, seed: u32, bytes: usize) {
    let pos = mgr.cache(id).unwrap().write_byte_pos();
    assert_eq!(mgr.write_frames(id, &pattern(seed, pos, bytes)).unwrap(), bytes);
}

#[test]
fn test_random_get_cluster_keeps_runs_ordered() {
    let mut mgr = test_manager(16, 2);
    let ids: Vec<_> = (0..3)
        .map(|n| mgr.acquire(&stereo_sample(n), 4000, unity()).unwrap())
        .collect();
    for (n, &id) in ids.iter().enumerate() {
        grow(&mut mgr, id, n as u32, 256 * (n + 3));
    }

    // Playback passes start anywhere and run to the end of the cache.
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let id = ids[rng.gen_range(0..ids.len())];
        let existing = mgr.cache(id).unwrap().existing_clusters();
        for i in rng.gen_range(0..existing)..existing {
            mgr.get_cluster(id, i).unwrap();
        }
        for &id in &ids {
            assert_run_ordered(&mgr, id);
        }
    }
    assert!(mgr.pool().queues_consistent());
}

#[test]
fn test_played_cache_survives_growth_of_another() {
    let mut mgr = test_manager(4, 2);
    let a = mgr.acquire(&stereo_sample(1), 4000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 4000, unity()).unwrap();
    grow(&mut mgr, a, 1, 512);
    grow(&mut mgr, b, 2, 512);
    assert_eq!(mgr.pool().free_count(), 0);

    // a was rendered first but is played again; b is left untouched.
    let mut out = vec![0u8; 512];
    assert_eq!(mgr.read_frames(a, 0, &mut out).unwrap(), 512);
    assert_run_ordered(&mgr, a);

    let c = mgr.acquire(&stereo_sample(3), 4000, unity()).unwrap();
    grow(&mut mgr, c, 3, 4);

    assert_eq!(mgr.cache(a).unwrap().write_byte_pos(), 512);
    assert_eq!(mgr.cache(b).unwrap().write_byte_pos(), 0);
    assert_eq!(mgr.metrics().snapshot().clusters_stolen, 1);
    mgr.read_frames(a, 0, &mut out).unwrap();
    assert_eq!(out, pattern(1, 0, 512));
    assert_cache_consistent(&mgr, a);
    assert_cache_consistent(&mgr, b);
}

#[test]
fn test_first_cluster_moves_run_to_tail() {
    let mut mgr = test_manager(8, 2);
    let a = mgr.acquire(&stereo_sample(1), 4000, unity()).unwrap();
    let b = mgr.acquire(&stereo_sample(2), 4000, unity()).unwrap();
    grow(&mut mgr, a, 1, 768);
    grow(&mut mgr, b, 2, 512);

    let a_run: Vec<_> = (0..3).map(|i| mgr.cache(a).unwrap().cluster_at(i).unwrap()).collect();
    let b_run: Vec<_> = (0..2).map(|i| mgr.cache(b).unwrap().cluster_at(i).unwrap()).collect();
    assert_eq!(cache_queue(&mgr), [a_run.clone(), b_run.clone()].concat());

    // Break a's run: cluster 1 pinned and released rejoins at the tail.
    let hold = mgr.hold_cluster(a, 1).unwrap();
    drop(hold);
    mgr.pool_mut().process_releases();
    assert_eq!(
        cache_queue(&mgr),
        vec![a_run[0], a_run[2], b_run[0], b_run[1], a_run[1]]
    );

    // A playback pass over a restores the run behind b.
    for i in 0..3 {
        mgr.get_cluster(a, i).unwrap();
    }
    assert_eq!(cache_queue(&mgr), [b_run.clone(), a_run.clone()].concat());
    assert_run_ordered(&mgr, a);
    assert_run_ordered(&mgr, b);
}

#[test]
fn test_held_clusters_never_queued_and_passes_reorder() {
    let mut mgr = test_manager(16, 2);
    let ids: Vec<_> = (0..3)
        .map(|n| mgr.acquire(&stereo_sample(n), 4000, unity()).unwrap())
        .collect();
    for (n, &id) in ids.iter().enumerate() {
        grow(&mut mgr, id, n as u32, 1024);
    }

    let mut rng = StdRng::seed_from_u64(42);
    let mut holds = Vec::new();
    for _ in 0..300 {
        let id = ids[rng.gen_range(0..ids.len())];
        let index = rng.gen_range(0..4);
        match rng.gen_range(0..3) {
            0 => holds.push(mgr.hold_cluster(id, index).unwrap()),
            1 if !holds.is_empty() => {
                let k = rng.gen_range(0..holds.len());
                drop(holds.swap_remove(k));
            }
            _ => {
                mgr.get_cluster(id, index).unwrap();
            }
        }
        mgr.pool_mut().process_releases();
        for hold in &holds {
            assert_eq!(mgr.pool().queue_of(hold.cluster()), None);
        }
    }

    holds.clear();
    mgr.pool_mut().process_releases();
    for &id in &ids {
        for i in 0..4 {
            mgr.get_cluster(id, i).unwrap();
        }
    }
    for &id in &ids {
        assert_run_ordered(&mgr, id);
        assert_cache_consistent(&mgr, id);
    }
}
