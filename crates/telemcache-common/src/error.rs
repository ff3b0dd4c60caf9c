//! Error types for telemcache
//!
//! This module defines the common error types used by both caches.

use crate::telem::TimeStamp;
use crate::types::DataType;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Common result type for telemcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for telemcache
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Metadata errors
    #[error("channel not found in cache: {key} (populate it before calling get)")]
    ChannelNotFound { key: String },

    #[error("remote fetch failed: {0}")]
    Fetch(#[from] FetchError),

    // Series errors
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange { start: TimeStamp, end: TimeStamp },

    #[error("data type mismatch: expected {expected}, got {actual}")]
    DataTypeMismatch { expected: DataType, actual: DataType },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not found error for the given key
    pub fn channel_not_found(key: impl fmt::Display) -> Self {
        Self::ChannelNotFound {
            key: key.to_string(),
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound { .. })
    }

    /// Remote failures are the only errors worth retrying. Whether the
    /// underlying source error is transient is up to the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// A failure raised by an injected remote fetch function.
///
/// The original error is kept behind an `Arc` so that one failure can be
/// handed to every caller waiting on the same in-flight fetch. Callers
/// recover the concrete type with [`FetchError::downcast_ref`].
#[derive(Clone)]
pub struct FetchError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl FetchError {
    /// Wrap a source error
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// Create from a plain message
    pub fn msg(msg: impl Into<String>) -> Self {
        Self(Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(
            msg.into(),
        )))
    }

    /// Borrow the original error as a concrete type
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether two handles refer to the same underlying failure
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FetchError({:?})", self.0)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}
