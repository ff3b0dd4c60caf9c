//! Multi-stream series cache
//!
//! Maps each channel to its own [`RangeCache`] behind a separate lock, so a
//! write to one stream excludes reads and writes on that stream only.

use crate::range_cache::{RangeCache, ReadResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use telemcache_common::{Channel, ChannelKey, Result, Series, SeriesConfig, TimeRange};
use tracing::{debug, info};

type Stream = Arc<RwLock<RangeCache>>;

/// Range caches keyed by channel
pub struct SeriesCache {
    streams: RwLock<HashMap<ChannelKey, Stream>>,
    config: SeriesConfig,
}

impl SeriesCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SeriesConfig::default())
    }

    #[must_use]
    pub fn with_config(config: SeriesConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Create the stream for `channel` bound to its data type. An existing
    /// stream is left as is.
    pub fn register(&self, channel: &Channel) {
        let mut streams = self.streams.write();
        streams.entry(channel.key).or_insert_with(|| {
            debug!(channel = %channel.key, data_type = %channel.data_type, "Registered stream");
            Arc::new(RwLock::new(RangeCache::with_data_type(
                channel.data_type,
                &self.config,
            )))
        });
    }

    /// Write into the stream for `key`, creating it on first use
    pub fn write(&self, key: ChannelKey, range: TimeRange, arrays: Vec<Series>) -> Result<()> {
        let stream = self.stream_or_create(key);
        let mut cache = stream.write();
        cache.write(range, arrays)
    }

    /// Write into the stream for `channel`, registering it first so its
    /// data type is enforced
    pub fn write_channel(&self, channel: &Channel, range: TimeRange, arrays: Vec<Series>) -> Result<()> {
        self.register(channel);
        self.write(channel.key, range, arrays)
    }

    /// Read from the stream for `key`. A stream never written to reports the
    /// whole query as a gap.
    pub fn read(&self, key: ChannelKey, query: &TimeRange) -> Result<ReadResult> {
        match self.stream(key) {
            Some(stream) => stream.read().read(query),
            None => RangeCache::new().read(query),
        }
    }

    /// Drop the stream for `key`, returning whether it existed
    pub fn remove(&self, key: ChannelKey) -> bool {
        let removed = self.streams.write().remove(&key).is_some();
        if removed {
            info!(channel = %key, "Removed stream from series cache");
        }
        removed
    }

    /// Keys of all streams, ascending
    #[must_use]
    pub fn streams(&self) -> Vec<ChannelKey> {
        let mut keys: Vec<_> = self.streams.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    /// Samples held across every stream
    #[must_use]
    pub fn total_samples(&self) -> usize {
        self.streams
            .read()
            .values()
            .map(|s| s.read().total_samples())
            .sum()
    }

    /// Drop all streams
    pub fn clear(&self) {
        let mut streams = self.streams.write();
        let count = streams.len();
        streams.clear();
        info!(streams = count, "Cleared series cache");
    }

    fn stream(&self, key: ChannelKey) -> Option<Stream> {
        self.streams.read().get(&key).cloned()
    }

    fn stream_or_create(&self, key: ChannelKey) -> Stream {
        if let Some(stream) = self.stream(key) {
            return stream;
        }
        let mut streams = self.streams.write();
        Arc::clone(
            streams
                .entry(key)
                .or_insert_with(|| Arc::new(RwLock::new(RangeCache::with_config(&self.config)))),
        )
    }
}

impl Default for SeriesCache {
    fn default() -> Self {
        Self::new()
    }
}
