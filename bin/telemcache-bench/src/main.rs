//! Telemcache Bench
//!
//! Runs the consumer read/backfill loop against a simulated remote source:
//! resolve channel metadata, read each channel's window from the series
//! cache, fetch the reported gaps remotely, write them back and re-read.

mod source;

use anyhow::{Result, bail};
use clap::Parser;
use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use source::SimulatedRemote;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use telemcache_common::{ChannelKey, OverlapPolicy, TimeRange, TimeSpan};
use telemcache_meta::{ChannelCache, Retriever};
use telemcache_series::SeriesCache;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "telemcache-bench")]
#[command(about = "Telemcache read/backfill benchmark")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "telemcache.toml")]
    config: String,

    /// Number of data channels
    #[arg(long)]
    channels: Option<u32>,

    /// Number of query rounds
    #[arg(long)]
    iterations: Option<u32>,

    /// Width of each query window in seconds
    #[arg(long)]
    window_secs: Option<i64>,

    /// Simulated remote latency in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Concurrent queries per round
    #[arg(long)]
    concurrency: Option<usize>,

    /// RNG seed for query windows
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Keep stored samples when a backfill overlaps them
    #[arg(long)]
    first_write_wins: bool,

    /// Issue a separate remote fetch per populate call
    #[arg(long)]
    no_dedupe: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    cache: telemcache_common::Config,
    #[serde(default)]
    bench: BenchConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct BenchConfig {
    #[serde(default = "default_channels")]
    channels: u32,
    #[serde(default = "default_iterations")]
    iterations: u32,
    #[serde(default = "default_window_secs")]
    window_secs: i64,
    #[serde(default = "default_latency_ms")]
    latency_ms: u64,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    /// Sample period of the simulated channels
    #[serde(default = "default_period_ms")]
    period_ms: i64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            iterations: default_iterations(),
            window_secs: default_window_secs(),
            latency_ms: default_latency_ms(),
            concurrency: default_concurrency(),
            period_ms: default_period_ms(),
        }
    }
}

fn default_channels() -> u32 {
    8
}

fn default_iterations() -> u32 {
    50
}

fn default_window_secs() -> i64 {
    60
}

fn default_latency_ms() -> u64 {
    5
}

fn default_concurrency() -> usize {
    4
}

fn default_period_ms() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Read the TOML config at `path`, falling back to defaults when the file
/// is missing or does not parse
fn load_config(path: &str) -> Result<FileConfig> {
    if !std::path::Path::new(path).exists() {
        return Ok(FileConfig::default());
    }
    let config_str = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to parse config file: {}", e);
        FileConfig::default()
    }))
}

/// Outcome of one query against the caches
#[derive(Debug, Default)]
struct QueryOutcome {
    complete_reads: u64,
    backfilled_gaps: u64,
}

/// Everything a query needs
struct Bench {
    remote: Arc<SimulatedRemote>,
    metadata: ChannelCache,
    series: SeriesCache,
}

impl Bench {
    /// Resolve metadata, then read every channel and backfill what is missing
    async fn query(&self, keys: &[ChannelKey], window: TimeRange) -> Result<QueryOutcome> {
        self.metadata.populate_missing(keys).await?;

        let mut outcome = QueryOutcome::default();
        for channel in self.metadata.get_many(keys)? {
            let result = self.series.read(channel.key, &window)?;
            if result.is_complete() {
                outcome.complete_reads += 1;
                continue;
            }

            for gap in result.gaps {
                let data = self.remote.read_series(&channel, gap).await?;
                self.series.write_channel(&channel, gap, vec![data])?;
                outcome.backfilled_gaps += 1;
            }

            let reread = self.series.read(channel.key, &window)?;
            if !reread.is_complete() {
                bail!(
                    "channel {} still has {} gaps in {window} after backfill",
                    channel.key,
                    reread.gaps.len()
                );
            }
        }
        Ok(outcome)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists
    let config = load_config(&args.config)?;

    // Merge CLI args with config file (CLI takes precedence)
    let log_level = if args.log_level != "info" {
        args.log_level.clone()
    } else {
        config.logging.level.clone()
    };
    let mut cache_config = config.cache.clone();
    if args.first_write_wins {
        cache_config.series.overlap_policy = OverlapPolicy::FirstWriteWins;
    }
    if args.no_dedupe {
        cache_config.metadata.dedupe_in_flight = false;
    }
    let channels = args.channels.unwrap_or(config.bench.channels);
    let iterations = args.iterations.unwrap_or(config.bench.iterations);
    let window = TimeSpan::seconds(args.window_secs.unwrap_or(config.bench.window_secs));
    let latency = Duration::from_millis(args.latency_ms.unwrap_or(config.bench.latency_ms));
    let concurrency = args.concurrency.unwrap_or(config.bench.concurrency).max(1);

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telemcache bench");
    info!("Config file: {}", args.config);
    info!(
        "Channels: {}, iterations: {}, window: {}, latency: {:?}, concurrency: {}",
        channels, iterations, window, latency, concurrency
    );
    info!(
        "Overlap policy: {:?}, in-flight dedupe: {}",
        cache_config.series.overlap_policy, cache_config.metadata.dedupe_in_flight
    );

    if window.nanos() <= 0 {
        bail!("query window must be positive, got {window}");
    }

    let remote = Arc::new(SimulatedRemote::new(
        channels,
        latency,
        TimeSpan::milliseconds(config.bench.period_ms),
    ));
    let bench = Bench {
        remote: Arc::clone(&remote),
        metadata: ChannelCache::with_config(
            Retriever::from_arc(remote.clone()),
            cache_config.metadata.clone(),
        ),
        series: SeriesCache::with_config(cache_config.series.clone()),
    };

    let all_keys = remote.keys();
    let horizon = window.nanos() * 4;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut complete_reads = 0u64;
    let mut backfilled_gaps = 0u64;
    let started = Instant::now();

    for round in 0..iterations {
        // Each concurrent query asks for an overlapping subset of channels
        let queries: Vec<(Vec<ChannelKey>, TimeRange)> = (0..concurrency)
            .map(|_| {
                let skip = rng.gen_range(0..all_keys.len().max(1));
                let keys: Vec<_> = all_keys.iter().skip(skip / 2).copied().collect();
                let start = rng.gen_range(0..horizon);
                let range = TimeRange::new(start.into(), (start + window.nanos()).into());
                (keys, range)
            })
            .collect();

        let outcomes = try_join_all(
            queries
                .iter()
                .map(|(keys, range)| bench.query(keys, *range)),
        )
        .await?;

        for outcome in outcomes {
            complete_reads += outcome.complete_reads;
            backfilled_gaps += outcome.backfilled_gaps;
        }
        debug!(round, streams = bench.series.len(), "Finished round");
    }

    let elapsed = started.elapsed();
    let stats = bench.metadata.stats();

    if bench.metadata.len() != all_keys.len() {
        warn!(
            "Metadata cache holds {} of {} channels",
            bench.metadata.len(),
            all_keys.len()
        );
    }

    info!("Finished {} rounds in {:?}", iterations, elapsed);
    info!(
        "Metadata: {} entries, {} remote calls, {} deduplicated waits, hit ratio {:.2}",
        bench.metadata.len(),
        remote.metadata_calls.load(Ordering::Relaxed),
        stats.deduplicated.load(Ordering::Relaxed),
        stats.hit_ratio()
    );
    info!(
        "Series: {} streams, {} samples cached, {} reads served from cache, {} gaps backfilled by {} remote reads",
        bench.series.len(),
        bench.series.total_samples(),
        complete_reads,
        backfilled_gaps,
        remote.series_calls.load(Ordering::Relaxed)
    );

    Ok(())
}
