//! Integration test modules for repitch
//!
//! - engine: builder, audio/loader split, custom fatal reporter
//! - growth: writing frames, exhaustion, self-theft
//! - stealing: reclamation between caches
//! - ordering: queue order of each cache's clusters
//! - stress: randomized operation sequences

pub mod engine;
pub mod ordering;
pub mod stealing;
