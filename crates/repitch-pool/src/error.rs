//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Cluster size exponent outside the supported range.
    #[error("Invalid cluster size magnitude: {0} (must be between {min} and {max})", min = crate::config::MIN_CLUSTER_SIZE_MAGNITUDE, max = crate::config::MAX_CLUSTER_SIZE_MAGNITUDE)]
    InvalidClusterSize(u8),

    /// Pool configured without any clusters.
    #[error("Pool has no clusters")]
    EmptyPool,

    /// The same region was listed twice.
    #[error("Region {0:?} configured more than once")]
    DuplicateRegion(crate::MemoryRegion),

    /// Invalid config.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
