//! Error types.

use crate::CacheId;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] repitch_pool::Error),

    /// Nothing free and nothing stealable. Render uncached instead.
    #[error("No cluster available for cache index {index}")]
    ClusterUnavailable { index: usize },

    /// Cache slot is empty (stolen or truncated).
    #[error("Cache cluster {index} does not exist")]
    ClusterMissing { index: usize },

    /// Cache not found.
    #[error("Cache not found: {0}")]
    CacheNotFound(CacheId),

    /// Cache limit reached.
    #[error("Too many caches (limit {0})")]
    TooManyCaches(usize),

    /// Byte count or position not a whole number of frames.
    #[error("{len} bytes is not a multiple of the {bytes_per_frame}-byte frame")]
    MisalignedFrames { len: usize, bytes_per_frame: usize },

    /// Frame wider than the cluster tail can absorb.
    #[error("{bytes_per_frame}-byte frames need a cluster tail of at least {needed} bytes")]
    FrameTooWide { bytes_per_frame: usize, needed: usize },

    /// Sample without channels.
    #[error("Sample has no channels")]
    NoChannels,
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
