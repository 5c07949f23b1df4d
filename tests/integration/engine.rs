//! Engine integration tests
//!
//! Builder configuration, the non-blocking audio path, and fatal error routing.

use repitch::prelude::*;
use repitch::{Error, FatalReporter, Violation};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;

use crate::helpers::*;

#[test]
fn test_builder_applies_configuration() {
    let engine = CacheEngine::builder()
        .cluster_size_magnitude(10)
        .clusters(12)
        .region(MemoryRegion::Internal, 4)
        .byte_depth(2)
        .max_caches(8)
        .strict(true)
        .build()
        .unwrap();

    let (size, capacity, depth, max) = engine.loader(|mgr| {
        (
            mgr.pool().cluster_size(),
            mgr.pool().capacity(),
            mgr.config().byte_depth,
            mgr.config().max_caches,
        )
    });
    assert_eq!(size, 1024);
    assert_eq!(capacity, 16);
    assert_eq!(depth, 2);
    assert_eq!(max, 8);
    assert_eq!(engine.pool_stats().free, 16);
}

#[test]
fn test_builder_rejects_invalid_pool() {
    let err = CacheEngine::builder()
        .cluster_size_magnitude(3)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Pool(repitch::pool::Error::InvalidClusterSize(3))));

    let err = CacheEngine::builder().clusters(0).build().unwrap_err();
    assert!(matches!(err, Error::Pool(repitch::pool::Error::EmptyPool)));
}

#[test]
fn test_try_audio_gives_up_while_loader_holds_manager() {
    let engine = test_engine(4);
    let skipped = engine.loader(|_mgr| engine.try_audio(|_| ()).is_none());
    assert!(skipped);
    assert_eq!(engine.try_audio(|mgr| mgr.len()), Some(0));
}

#[test]
fn test_loader_and_audio_threads_share_caches() {
    let engine = test_engine(16);
    let sample = stereo_sample(1);
    let length = 3000;
    let id = engine.acquire(&sample, length, unity()).unwrap();

    let loader = {
        let engine = engine.clone();
        thread::spawn(move || {
            let mut pos = 0;
            while pos < length {
                let chunk = pattern(1, pos, 200.min(length - pos));
                pos += engine.loader(|mgr| mgr.write_frames(id, &chunk)).unwrap();
            }
        })
    };

    // Audio side: read whatever is rendered so far, never waiting.
    let mut out = vec![0u8; 64];
    for _ in 0..1000 {
        if let Some(Ok(n)) = engine.try_audio(|mgr| mgr.read_frames(id, 0, &mut out)) {
            assert_eq!(out[..n], pattern(1, 0, n)[..]);
        }
    }
    loader.join().unwrap();

    let mut all = vec![0u8; length];
    let read = engine.loader(|mgr| mgr.read_frames(id, 0, &mut all)).unwrap();
    assert_eq!(read, length);
    assert_eq!(all, pattern(1, 0, length));
    assert_eq!(engine.metrics().bytes_written, length as u64);
}

#[test]
fn test_acquire_release_through_engine() {
    let engine = test_engine(4);
    let sample = stereo_sample(3);
    let a = engine.acquire(&sample, 1000, unity()).unwrap();
    let b = engine.acquire(&sample, 1000, unity()).unwrap();
    assert_eq!(a, b);

    engine.loader(|mgr| mgr.write_frames(a, &pattern(3, 0, 512))).unwrap();
    assert!(!engine.release(a).unwrap());
    assert!(engine.release(a).unwrap());
    assert_eq!(engine.pool_stats().free, 4);

    let snapshot = engine.metrics();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.caches_created, 1);
    assert_eq!(snapshot.caches_destroyed, 1);
}

#[test]
fn test_clear_destroys_everything() {
    let engine = test_engine(4);
    for n in 0..2 {
        let id = engine.acquire(&stereo_sample(n), 1000, unity()).unwrap();
        engine.loader(|mgr| mgr.write_frames(id, &pattern(n, 0, 300))).unwrap();
    }
    engine.clear();
    assert_eq!(engine.pool_stats().free, 4);
    assert!(engine.loader(|mgr| mgr.is_empty()));
}

struct RecordingReporter {
    seen: Mutex<Vec<Violation>>,
}

impl FatalReporter for RecordingReporter {
    fn report_fatal(&self, violation: Violation) -> ! {
        self.seen.lock().unwrap().push(violation);
        panic!("halted on {violation}");
    }
}

#[test]
fn test_custom_fatal_reporter_receives_violation() {
    let reporter = Arc::new(RecordingReporter {
        seen: Mutex::new(Vec::new()),
    });
    let engine = CacheEngine::builder()
        .cluster_size_magnitude(TEST_MAGNITUDE)
        .clusters(2)
        .byte_depth(2)
        .strict(true)
        .fatal_reporter(reporter.clone())
        .build()
        .unwrap();
    let id = engine.acquire(&stereo_sample(1), 100, unity()).unwrap();

    // Aligned but past the end of the waveform.
    let result = catch_unwind(AssertUnwindSafe(|| {
        engine.loader(|mgr| mgr.set_write_byte_pos(id, 104))
    }));
    assert!(result.is_err());
    assert_eq!(
        *reporter.seen.lock().unwrap(),
        vec![Violation::WritePosBeyondCapacity]
    );
    assert_eq!(Violation::WritePosBeyondCapacity.code(), "E301");
}
