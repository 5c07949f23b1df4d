//! Source samples and cache identity.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of a loaded sample, assigned by whoever loads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub u32);

/// Read-only description of a loaded audio file.
///
/// Shared through `Arc` by every cache rendered from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    id: SampleId,
    path: PathBuf,
    num_channels: u8,
    length_frames: Option<u64>,
}

impl Sample {
    pub fn new(id: SampleId, path: impl Into<PathBuf>, num_channels: u8) -> Self {
        Self {
            id,
            path: path.into(),
            num_channels,
            length_frames: None,
        }
    }

    pub fn with_length(mut self, frames: u64) -> Self {
        self.length_frames = Some(frames);
        self
    }

    #[inline]
    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn num_channels(&self) -> u8 {
        self.num_channels
    }

    /// Length in frames, if known.
    pub fn length_frames(&self) -> Option<u64> {
        self.length_frames
    }
}

/// Resampling parameters a cache was rendered with.
///
/// Caches with different parameters are never merged, even for the same sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepitchParams {
    /// Playback phase increment (pitch), 24-bit fixed point.
    pub phase_increment: i32,
    /// Time-stretch ratio, 24-bit fixed point.
    pub time_stretch_ratio: i32,
    /// Source samples skipped before rendering starts.
    pub skip_samples_at_start: i32,
}

impl RepitchParams {
    /// Unity pitch and stretch.
    pub const UNITY: i32 = 1 << 24;

    pub fn new(phase_increment: i32, time_stretch_ratio: i32) -> Self {
        Self {
            phase_increment,
            time_stretch_ratio,
            skip_samples_at_start: 0,
        }
    }

    pub fn skip(mut self, samples: i32) -> Self {
        self.skip_samples_at_start = samples;
        self
    }
}

/// Lookup key of a sample cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub sample: SampleId,
    pub params: RepitchParams,
}

impl CacheKey {
    pub fn new(sample: SampleId, params: RepitchParams) -> Self {
        Self { sample, params }
    }
}
