//! Pool configuration.

use crate::error::{Error, Result};
use crate::MemoryRegion;
use serde::{Deserialize, Serialize};

pub const MIN_CLUSTER_SIZE_MAGNITUDE: u8 = 6;
pub const MAX_CLUSTER_SIZE_MAGNITUDE: u8 = 20;

/// Number of clusters carved out of one memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub region: MemoryRegion,
    pub clusters: usize,
}

impl RegionConfig {
    pub fn new(region: MemoryRegion, clusters: usize) -> Self {
        Self { region, clusters }
    }
}

/// Configuration for the cluster pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Cluster size as a power of two (default: 15, i.e. 32 KiB)
    pub cluster_size_magnitude: u8,
    /// Extra bytes after each cluster so a sample frame starting near the
    /// end can be stored whole (default: 7)
    pub cluster_tail_bytes: usize,
    /// Regions in allocation order (default: 128 external clusters)
    pub regions: Vec<RegionConfig>,
    /// Report invariant violations as fatal errors (default: on in debug builds)
    pub strict: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cluster_size_magnitude: 15,
            cluster_tail_bytes: 7,
            regions: vec![RegionConfig::new(MemoryRegion::External, 128)],
            strict: cfg!(debug_assertions),
        }
    }
}

impl PoolConfig {
    /// Single external region with `clusters` clusters of `1 << magnitude` bytes.
    pub fn with_clusters(magnitude: u8, clusters: usize) -> Self {
        Self {
            cluster_size_magnitude: magnitude,
            regions: vec![RegionConfig::new(MemoryRegion::External, clusters)],
            ..Default::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn region(mut self, region: MemoryRegion, clusters: usize) -> Self {
        match self.regions.iter_mut().find(|r| r.region == region) {
            Some(existing) => existing.clusters = clusters,
            None => self.regions.push(RegionConfig::new(region, clusters)),
        }
        self
    }

    #[inline]
    pub fn cluster_size(&self) -> usize {
        1usize << self.cluster_size_magnitude
    }

    pub fn total_clusters(&self) -> usize {
        self.regions.iter().map(|r| r.clusters).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_CLUSTER_SIZE_MAGNITUDE..=MAX_CLUSTER_SIZE_MAGNITUDE)
            .contains(&self.cluster_size_magnitude)
        {
            return Err(Error::InvalidClusterSize(self.cluster_size_magnitude));
        }
        for (i, r) in self.regions.iter().enumerate() {
            if self.regions[..i].iter().any(|o| o.region == r.region) {
                return Err(Error::DuplicateRegion(r.region));
            }
        }
        if self.total_clusters() == 0 {
            return Err(Error::EmptyPool);
        }
        if self.total_clusters() > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "{} clusters exceeds the addressable range",
                self.total_clusters()
            )));
        }
        if self.cluster_tail_bytes >= self.cluster_size() {
            return Err(Error::InvalidConfig(format!(
                "tail of {} bytes does not fit a {} byte cluster",
                self.cluster_tail_bytes,
                self.cluster_size()
            )));
        }
        Ok(())
    }
}
