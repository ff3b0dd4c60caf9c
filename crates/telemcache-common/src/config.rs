//! Configuration types for telemcache
//!
//! This module defines the configuration structures shared by the caches.

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Metadata cache configuration
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Series range cache configuration
    #[serde(default)]
    pub series: SeriesConfig,
}

/// Metadata cache configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Let concurrent populate calls share an in-flight fetch for the same key
    #[serde(default = "default_dedupe_in_flight")]
    pub dedupe_in_flight: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            dedupe_in_flight: default_dedupe_in_flight(),
        }
    }
}

fn default_dedupe_in_flight() -> bool {
    true
}

/// Series range cache configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Which samples survive where a write overlaps stored data
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

/// Resolution of samples in the sub-range where a write overlaps an
/// existing segment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Incoming samples replace stored samples inside the written range
    #[default]
    LastWriteWins,
    /// Stored samples are kept; incoming samples only fill uncovered time
    FirstWriteWins,
}
