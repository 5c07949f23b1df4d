//! Centralized error type for the repitch umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] repitch_pool::Error),

    #[error("Cache: {0}")]
    Cache(#[from] repitch_cache::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
