//! Metadata cache
//!
//! Maps descriptor keys to descriptors fetched from a remote source.
//! Entries are insert-only: the first descriptor stored for a key stays
//! there, and later populate calls for that key are no-ops.
//!
//! Concurrent populate calls share in-flight fetches per key. Each fetch is
//! a [`Shared`] future registered (weakly) in a pending table; a caller
//! needing a key that is already being fetched awaits that future instead
//! of issuing its own request. Fetches only retrieve. Each caller stores
//! the batches it awaited once all of them succeeded, so a failed call
//! leaves the cache as it was.

use crate::retriever::Retriever;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared, join_all};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use telemcache_common::{Channel, Descriptor, Error, FetchError, MetadataConfig, Result};
use tracing::{debug, warn};

type FetchFuture<D> = BoxFuture<'static, std::result::Result<Arc<Batch<D>>, FetchError>>;
type PendingFetch<D> = Shared<FetchFuture<D>>;

/// Cache of channel descriptors
pub type ChannelCache = MetadataCache<Channel>;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// `get` calls answered from the cache
    pub hits: AtomicU64,
    /// `get` calls for keys that were never populated
    pub misses: AtomicU64,
    /// Remote fetches issued
    pub fetches: AtomicU64,
    /// Keys requested from the remote source
    pub fetched_keys: AtomicU64,
    /// Keys that joined a fetch already in flight
    pub deduplicated: AtomicU64,
    /// Populate calls that found every key cached
    pub noop_populates: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

/// Result of one remote fetch
struct Batch<D: Descriptor> {
    keys: Vec<D::Key>,
    descriptors: Vec<Arc<D>>,
}

/// State reachable from in-flight fetch futures
struct Shelf<D: Descriptor> {
    entries: RwLock<HashMap<D::Key, Arc<D>>>,
    pending: Mutex<HashMap<D::Key, (u64, WeakShared<FetchFuture<D>>)>>,
}

impl<D: Descriptor> Shelf<D> {
    /// Store descriptors under keys that are still vacant
    fn insert_missing(&self, descriptors: &[Arc<D>]) -> usize {
        let mut entries = self.entries.write();
        let mut inserted = 0;
        for descriptor in descriptors {
            if let Entry::Vacant(slot) = entries.entry(descriptor.key()) {
                slot.insert(Arc::clone(descriptor));
                inserted += 1;
            }
        }
        inserted
    }

    /// Drop the pending entries fetch `id` registered for `keys`
    fn release(&self, id: u64, keys: &[D::Key]) {
        let mut pending = self.pending.lock();
        for key in keys {
            if pending.get(key).is_some_and(|(held, _)| *held == id) {
                pending.remove(key);
            }
        }
    }
}

/// Releases a fetch's pending entries if it fails or is dropped unfinished
struct PendingGuard<D: Descriptor> {
    shelf: Arc<Shelf<D>>,
    keys: Vec<D::Key>,
    id: u64,
    armed: bool,
}

impl<D: Descriptor> Drop for PendingGuard<D> {
    fn drop(&mut self) {
        if self.armed {
            self.shelf.release(self.id, &self.keys);
        }
    }
}

/// Key to descriptor cache with lazy, deduplicated population
pub struct MetadataCache<D: Descriptor> {
    shelf: Arc<Shelf<D>>,
    retriever: Retriever<D>,
    config: MetadataConfig,
    stats: Arc<CacheStats>,
    next_fetch_id: AtomicU64,
}

impl<D: Descriptor> MetadataCache<D> {
    /// Create an empty cache with default configuration
    pub fn new(retriever: Retriever<D>) -> Self {
        Self::with_config(retriever, MetadataConfig::default())
    }

    /// Create an empty cache
    pub fn with_config(retriever: Retriever<D>, config: MetadataConfig) -> Self {
        Self {
            shelf: Arc::new(Shelf {
                entries: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
            retriever,
            config,
            stats: Arc::new(CacheStats::default()),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    /// Look up a populated descriptor. No network access.
    ///
    /// Fails with [`Error::ChannelNotFound`] if `key` was never populated;
    /// callers must run [`populate_missing`](Self::populate_missing) first.
    pub fn get(&self, key: &D::Key) -> Result<Arc<D>> {
        let entries = self.shelf.entries.read();
        match entries.get(key) {
            Some(descriptor) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(descriptor))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Err(Error::channel_not_found(key))
            }
        }
    }

    /// Look up several populated descriptors, in the order of `keys`
    pub fn get_many(&self, keys: &[D::Key]) -> Result<Vec<Arc<D>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Fetch and store every key in `keys` that is not cached yet.
    ///
    /// Issues no remote call when all keys are present. Otherwise the
    /// missing keys not already in flight go out in one batch, and keys in
    /// flight from another call are awaited rather than fetched again.
    /// Descriptors already cached are never replaced. If any awaited fetch
    /// fails, its error is returned and this call stores nothing.
    pub async fn populate_missing(&self, keys: &[D::Key]) -> Result<()> {
        let missing = self.missing(keys);
        if missing.is_empty() {
            self.stats.noop_populates.fetch_add(1, Ordering::Relaxed);
            debug!(count = keys.len(), "All keys cached, skipping remote fetch");
            return Ok(());
        }

        let (ids, waits): (Vec<u64>, Vec<PendingFetch<D>>) =
            self.claim(missing).into_iter().unzip();
        let mut batches = Vec::with_capacity(ids.len());
        let mut failure = None;
        for (id, result) in ids.into_iter().zip(join_all(waits).await) {
            match result {
                Ok(batch) => batches.push((id, batch)),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        if let Some(err) = failure {
            for (id, batch) in &batches {
                self.shelf.release(*id, &batch.keys);
            }
            return Err(err.into());
        }

        for (id, batch) in &batches {
            let inserted = self.shelf.insert_missing(&batch.descriptors);
            self.shelf.release(*id, &batch.keys);
            debug!(id, inserted, requested = batch.keys.len(), "Populated metadata cache");
        }
        Ok(())
    }

    /// Populate `keys` and return their descriptors in order
    pub async fn retrieve(&self, keys: &[D::Key]) -> Result<Vec<Arc<D>>> {
        self.populate_missing(keys).await?;
        self.get_many(keys)
    }

    /// Check if key is cached
    pub fn contains(&self, key: &D::Key) -> bool {
        self.shelf.entries.read().contains_key(key)
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.shelf.entries.read().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a fetch in flight
    pub fn pending(&self) -> usize {
        self.shelf.pending.lock().len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Distinct requested keys absent from the cache, in key order
    fn missing(&self, keys: &[D::Key]) -> Vec<D::Key> {
        let entries = self.shelf.entries.read();
        keys.iter()
            .filter(|key| !entries.contains_key(*key))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Split `missing` into keys already in flight and keys to fetch now,
    /// start the new fetch, and return every fetch the caller must await
    /// tagged with its id.
    fn claim(&self, missing: Vec<D::Key>) -> Vec<(u64, PendingFetch<D>)> {
        if !self.config.dedupe_in_flight {
            let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
            return vec![(id, self.start_fetch(missing, id))];
        }

        // Lock order: pending, then entries. Callers insert before they
        // release, so a key that is neither pending nor cached here really
        // needs fetching.
        let mut pending = self.shelf.pending.lock();
        let entries = self.shelf.entries.read();
        let mut joined: BTreeMap<u64, PendingFetch<D>> = BTreeMap::new();
        let mut to_fetch = Vec::new();
        for key in missing {
            if entries.contains_key(&key) {
                continue;
            }
            match pending.get(&key).and_then(|(id, weak)| Some((*id, weak.upgrade()?))) {
                Some((id, fetch)) => {
                    self.stats.deduplicated.fetch_add(1, Ordering::Relaxed);
                    joined.entry(id).or_insert(fetch);
                }
                None => to_fetch.push(key),
            }
        }
        drop(entries);

        if !joined.is_empty() {
            debug!(fetches = joined.len(), "Joining metadata fetches already in flight");
        }

        if !to_fetch.is_empty() {
            let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
            let fetch = self.start_fetch(to_fetch.clone(), id);
            // A completed future cannot be downgraded; it has nothing left to share.
            if let Some(weak) = fetch.downgrade() {
                for key in to_fetch {
                    pending.insert(key, (id, weak.clone()));
                }
            }
            joined.insert(id, fetch);
        }

        drop(pending);
        joined.into_iter().collect()
    }

    /// Build the shared fetch future for `keys`
    fn start_fetch(&self, keys: Vec<D::Key>, id: u64) -> PendingFetch<D> {
        let retriever = self.retriever.clone();
        let stats = Arc::clone(&self.stats);
        let mut guard = PendingGuard {
            shelf: Arc::clone(&self.shelf),
            keys,
            id,
            armed: true,
        };

        let fetch: FetchFuture<D> = async move {
            stats.fetches.fetch_add(1, Ordering::Relaxed);
            stats
                .fetched_keys
                .fetch_add(guard.keys.len() as u64, Ordering::Relaxed);
            debug!(id, count = guard.keys.len(), "Fetching missing descriptors");

            let fetched = retriever.retrieve(&guard.keys).await.inspect_err(|err| {
                warn!(id, error = %err, "Metadata fetch failed");
            })?;
            let descriptors: Vec<Arc<D>> = fetched.into_iter().map(Arc::new).collect();

            let returned: HashSet<D::Key> = descriptors.iter().map(|d| d.key()).collect();
            let absent: Vec<&D::Key> = guard
                .keys
                .iter()
                .filter(|key| !returned.contains(*key))
                .collect();
            if !absent.is_empty() {
                warn!(id, ?absent, "Remote source returned no descriptor for {} keys", absent.len());
            }

            // Pending entries now stay until a waiter has stored the batch.
            guard.armed = false;
            Ok(Arc::new(Batch {
                keys: std::mem::take(&mut guard.keys),
                descriptors,
            }))
        }
        .boxed();
        fetch.shared()
    }
}
