//! Remote descriptor retrieval
//!
//! The retriever performs no caching and no deduplication: every call is
//! exactly one call to the injected source with the full key list.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use telemcache_common::{Descriptor, FetchError};
use tracing::debug;

/// Backing source of descriptors, typically an RPC client
#[async_trait]
pub trait DescriptorSource<D: Descriptor>: Send + Sync {
    /// Fetch the descriptors for `keys`. The result need not follow the
    /// order of `keys` and may omit keys the source does not know.
    async fn fetch(&self, keys: &[D::Key]) -> Result<Vec<D>, FetchError>;
}

/// Adapter turning an async closure into a [`DescriptorSource`]
pub struct FnSource<F>(F);

impl<F> FnSource<F> {
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<D, F, Fut> DescriptorSource<D> for FnSource<F>
where
    D: Descriptor,
    F: Fn(Vec<D::Key>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<D>, FetchError>> + Send,
{
    async fn fetch(&self, keys: &[D::Key]) -> Result<Vec<D>, FetchError> {
        (self.0)(keys.to_vec()).await
    }
}

/// Thin wrapper around the injected remote source
pub struct Retriever<D: Descriptor> {
    source: Arc<dyn DescriptorSource<D>>,
}

impl<D: Descriptor> Clone for Retriever<D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<D: Descriptor> Retriever<D> {
    /// Create a retriever over a source
    pub fn new<S: DescriptorSource<D> + 'static>(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Create a retriever over a shared source
    pub fn from_arc(source: Arc<dyn DescriptorSource<D>>) -> Self {
        Self { source }
    }

    /// Create a retriever over an async closure
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<D::Key>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<D>, FetchError>> + Send + 'static,
    {
        Self::new(FnSource::new(f))
    }

    /// Fetch descriptors for `keys` in a single call to the source.
    ///
    /// Failures from the source are returned as-is.
    pub async fn retrieve(&self, keys: &[D::Key]) -> Result<Vec<D>, FetchError> {
        debug!(count = keys.len(), "Retrieving descriptors from remote source");
        self.source.fetch(keys).await
    }
}
