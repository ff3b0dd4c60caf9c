//! Telemcache Series - Time-range indexed sample cache
//!
//! Stores any number of disjoint time ranges of sample data per stream and,
//! on read, reports exactly which parts of a query are not covered so that
//! only the missing data has to be fetched remotely.
//!
//! # Read/backfill loop
//!
//! ```text
//!   read(query) ──► segments + gaps
//!                        │
//!          gaps empty? ──┤── no ──► fetch gaps remotely ──► write(gap, arrays)
//!                        │                                        │
//!                       yes ◄──────────── read(query) ◄───────────┘
//! ```
//!
//! [`RangeCache`] holds one stream; [`SeriesCache`] maps channel keys to
//! independently locked range caches.

pub mod range_cache;
pub mod segment;
pub mod streams;

pub use range_cache::{RangeCache, ReadResult};
pub use segment::Segment;
pub use streams::SeriesCache;
