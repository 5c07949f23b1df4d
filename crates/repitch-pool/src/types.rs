//! Identifiers and classification enums shared by the pool and its users.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a cluster inside the pool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub(crate) u32);

impl ClusterId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster#{}", self.0)
    }
}

/// Opaque identity of something that owns clusters (a sample cache, a sample loader).
///
/// The pool never interprets it; it only compares owners for self-theft
/// protection and hands it back through [`StealableOwners`](crate::StealableOwners).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Physical memory region a cluster lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRegion {
    /// On-chip RAM. Small and fast, shared with everything else.
    Internal,
    /// External SDRAM. Where all cache data is expected to live.
    External,
}

impl MemoryRegion {
    pub const COUNT: usize = 2;

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            MemoryRegion::Internal => 0,
            MemoryRegion::External => 1,
        }
    }
}

/// Usage class of an eviction queue.
///
/// Declaration order is reclamation order: the allocator drains the first
/// queue before it touches the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StealableQueue {
    /// Raw sample data not used by the current song.
    NoSongSampleData,
    /// Repitched cache data not used by the current song.
    NoSongRepitchedCache,
    /// Repitched cache data of the current song.
    CurrentSongRepitchedCache,
    /// Raw sample data of the current song.
    CurrentSongSampleData,
}

impl StealableQueue {
    pub const COUNT: usize = 4;

    pub const ALL: [StealableQueue; Self::COUNT] = [
        StealableQueue::NoSongSampleData,
        StealableQueue::NoSongRepitchedCache,
        StealableQueue::CurrentSongRepitchedCache,
        StealableQueue::CurrentSongSampleData,
    ];

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// What a cluster is used for. Decides which regions it may come from and
/// which queue it returns to once it becomes stealable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Raw sample data streamed in by the loader.
    Sample,
    /// Resampled / time-stretched waveform data owned by a sample cache.
    SampleCache,
}

impl ClusterType {
    /// Regions this type may be allocated from, in preference order.
    pub fn regions(self) -> &'static [MemoryRegion] {
        match self {
            ClusterType::Sample => &[MemoryRegion::External, MemoryRegion::Internal],
            ClusterType::SampleCache => &[MemoryRegion::External],
        }
    }

    /// Queue a cluster of this type joins when it becomes stealable.
    pub fn default_queue(self) -> StealableQueue {
        match self {
            ClusterType::Sample => StealableQueue::CurrentSongSampleData,
            ClusterType::SampleCache => StealableQueue::CurrentSongRepitchedCache,
        }
    }
}
