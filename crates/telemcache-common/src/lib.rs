//! Telemcache Common - Shared types and utilities
//!
//! This crate provides the time primitives, channel descriptors, sample
//! arrays, error definitions, and sorted-interval helpers used by the
//! metadata cache and the series range cache.

pub mod config;
pub mod error;
pub mod search;
pub mod series;
pub mod telem;
pub mod types;

pub use config::{Config, MetadataConfig, OverlapPolicy, SeriesConfig};
pub use error::{Error, FetchError, Result};
pub use series::Series;
pub use telem::{TimeRange, TimeSpan, TimeStamp};
pub use types::*;
