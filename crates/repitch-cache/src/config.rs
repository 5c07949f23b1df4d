//! Cache manager configuration.

use serde::{Deserialize, Serialize};

/// Configuration for rendered caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bytes per stored sample (default: 3, 24-bit)
    pub byte_depth: u8,
    /// Maximum number of live caches (default: 256)
    pub max_caches: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            byte_depth: 3,
            max_caches: 256,
        }
    }
}

impl CacheConfig {
    /// Create config with a custom sample width, clamped to 1..=4 bytes.
    pub fn with_byte_depth(depth: u8) -> Self {
        Self {
            byte_depth: depth.clamp(1, 4),
            ..Default::default()
        }
    }

    pub fn max_caches(mut self, max: usize) -> Self {
        self.max_caches = max.max(1);
        self
    }

    /// Frame size for a sample with `channels` channels.
    pub fn bytes_per_frame(&self, channels: u8) -> usize {
        channels as usize * self.byte_depth as usize
    }
}
