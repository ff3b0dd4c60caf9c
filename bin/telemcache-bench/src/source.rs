//! Simulated remote backend
//!
//! Serves channel descriptors and sample data after a fixed latency, and
//! counts the calls it receives so the bench can report how much remote
//! traffic the caches saved.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use telemcache_common::{Channel, ChannelKey, DataType, FetchError, Series, TimeRange, TimeSpan, TimeStamp};
use telemcache_meta::DescriptorSource;
use tracing::debug;

/// Key of the shared index channel
pub const INDEX_KEY: u32 = 1;

/// In-memory stand-in for the cluster's metadata and data services
pub struct SimulatedRemote {
    channels: HashMap<ChannelKey, Channel>,
    latency: Duration,
    period: TimeSpan,
    pub metadata_calls: AtomicU64,
    pub series_calls: AtomicU64,
}

impl SimulatedRemote {
    /// One index channel plus `data_channels` float channels sampled every
    /// `period`
    pub fn new(data_channels: u32, latency: Duration, period: TimeSpan) -> Self {
        let mut channels = HashMap::new();
        let index = Channel::new_index(INDEX_KEY, "time");
        channels.insert(index.key, index);
        for n in 0..data_channels {
            let key = INDEX_KEY + 1 + n;
            let channel = Channel::new(key, format!("sensor_{n}"), DataType::Float64, INDEX_KEY);
            channels.insert(channel.key, channel);
        }
        Self {
            channels,
            latency,
            period,
            metadata_calls: AtomicU64::new(0),
            series_calls: AtomicU64::new(0),
        }
    }

    /// Every channel key, ascending
    pub fn keys(&self) -> Vec<ChannelKey> {
        let mut keys: Vec<_> = self.channels.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Samples of `channel` inside `range`, one per period boundary
    pub async fn read_series(&self, channel: &Channel, range: TimeRange) -> Result<Series, FetchError> {
        self.series_calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;

        let period = self.period.nanos().max(1);
        let first = range.start.nanos().div_euclid(period) * period;
        let first = if first < range.start.nanos() { first + period } else { first };
        let stamps: Vec<TimeStamp> = (first..range.end.nanos())
            .step_by(period as usize)
            .map(TimeStamp::new)
            .collect();
        debug!(channel = %channel.key, %range, samples = stamps.len(), "Serving series read");

        if channel.is_index {
            return Series::index(stamps).map_err(FetchError::new);
        }
        let key = f64::from(channel.key.as_u32());
        let values: Vec<f64> = stamps
            .iter()
            .map(|ts| (ts.nanos() as f64 / 1e9 + key).sin())
            .collect();
        Series::from_f64(stamps, &values).map_err(FetchError::new)
    }
}

#[async_trait]
impl DescriptorSource<Channel> for SimulatedRemote {
    async fn fetch(&self, keys: &[ChannelKey]) -> Result<Vec<Channel>, FetchError> {
        self.metadata_calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;
        Ok(keys
            .iter()
            .filter_map(|key| self.channels.get(key).cloned())
            .collect())
    }
}
