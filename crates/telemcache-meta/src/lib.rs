//! Telemcache Meta - Channel metadata cache
//!
//! This crate resolves channel descriptors from a remote source and keeps
//! them in memory:
//!
//! - [`Retriever`]: thin wrapper around an injected batch-fetch function
//! - [`MetadataCache`]: key to descriptor map with synchronous lookup and an
//!   asynchronous populate that batches and deduplicates remote fetches

pub mod cache;
pub mod retriever;

pub use cache::{CacheStats, ChannelCache, MetadataCache};
pub use retriever::{DescriptorSource, FnSource, Retriever};
