//! Core type definitions for telemcache
//!
//! This module defines channel descriptors, their keys, and the sample
//! data types a channel can carry.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// An immutable record that can be cached by key.
///
/// Implemented by [`Channel`]; any other remote descriptor with a unique,
/// hashable key can be cached the same way.
pub trait Descriptor: Send + Sync + 'static {
    /// Unique identifier of the descriptor
    type Key: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// The key this descriptor is stored under
    fn key(&self) -> Self::Key;
}

/// Unique identifier for a channel
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    From,
    Into,
    Display,
)]
#[display("{_0}")]
pub struct ChannelKey(u32);

impl ChannelKey {
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey({})", self.0)
    }
}

/// Sample data type of a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[display("float64")]
    Float64,
    #[display("float32")]
    Float32,
    #[display("int64")]
    Int64,
    #[display("int32")]
    Int32,
    #[display("int16")]
    Int16,
    #[display("int8")]
    Int8,
    #[display("uint64")]
    Uint64,
    #[display("uint32")]
    Uint32,
    #[display("uint16")]
    Uint16,
    #[display("uint8")]
    Uint8,
    #[display("timestamp")]
    Timestamp,
    #[display("string")]
    String,
    #[display("json")]
    Json,
}

impl DataType {
    /// Bytes per sample, or `None` for newline-delimited variable-width types
    #[must_use]
    pub const fn density(self) -> Option<usize> {
        match self {
            Self::Float64 | Self::Int64 | Self::Uint64 | Self::Timestamp => Some(8),
            Self::Float32 | Self::Int32 | Self::Uint32 => Some(4),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int8 | Self::Uint8 => Some(1),
            Self::String | Self::Json => None,
        }
    }

    #[must_use]
    pub const fn is_variable(self) -> bool {
        self.density().is_none()
    }
}

/// Descriptor of one logical data stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique key
    pub key: ChannelKey,
    /// Human-readable name
    pub name: String,
    /// Sample data type
    pub data_type: DataType,
    /// Whether this channel holds the timestamps other channels are indexed by
    pub is_index: bool,
    /// Key of the index channel this channel is indexed by (zero if none)
    #[serde(default)]
    pub index: ChannelKey,
    /// Whether the channel is written by a virtual (non-persisted) source
    #[serde(default)]
    pub is_virtual: bool,
}

impl Channel {
    /// Create a data channel indexed by `index`
    pub fn new(key: u32, name: impl Into<String>, data_type: DataType, index: u32) -> Self {
        Self {
            key: ChannelKey::new(key),
            name: name.into(),
            data_type,
            is_index: false,
            index: ChannelKey::new(index),
            is_virtual: false,
        }
    }

    /// Create an index (timestamp) channel; it is its own index.
    pub fn new_index(key: u32, name: impl Into<String>) -> Self {
        Self {
            key: ChannelKey::new(key),
            name: name.into(),
            data_type: DataType::Timestamp,
            is_index: true,
            index: ChannelKey::new(key),
            is_virtual: false,
        }
    }
}

impl Descriptor for Channel {
    type Key = ChannelKey;

    fn key(&self) -> ChannelKey {
        self.key
    }
}
