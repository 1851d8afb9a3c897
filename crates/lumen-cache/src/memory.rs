//! In-memory cache implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{Cache, CacheBucket};

type Entries = HashMap<String, (String, Vec<u8>)>;

/// Process-local [`Cache`].
///
/// Bucket handles with the same name share one map, so a handle opened by one
/// pipeline sees entries written through another. Cloning the cache shares the
/// storage too.
#[derive(Clone, Default)]
pub struct MemoryCache {
    buckets: Arc<RwLock<HashMap<String, Arc<RwLock<Entries>>>>>,
    /// Maximum entries per bucket, unbounded when `None`.
    capacity: Option<usize>,
}

impl MemoryCache {
    /// Create an empty, unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding at most `capacity` entries per bucket.
    ///
    /// Writing a new key to a full bucket evicts an arbitrary entry.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Number of entries stored in a bucket.
    #[must_use]
    pub fn entry_count(&self, bucket: &str) -> usize {
        let Some(entries) = self
            .buckets
            .read()
            .ok()
            .and_then(|buckets| buckets.get(bucket).cloned())
        else {
            return 0;
        };
        entries.read().map_or(0, |e| e.len())
    }

    fn entries(&self, name: &str) -> Arc<RwLock<Entries>> {
        if let Ok(buckets) = self.buckets.read()
            && let Some(entries) = buckets.get(name)
        {
            return Arc::clone(entries);
        }
        match self.buckets.write() {
            Ok(mut buckets) => Arc::clone(buckets.entry(name.to_owned()).or_default()),
            Err(_) => {
                tracing::warn!(bucket = name, "memory cache lock poisoned, using detached bucket");
                Arc::default()
            }
        }
    }
}

impl Cache for MemoryCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(MemoryCacheBucket {
            entries: self.entries(name),
            capacity: self.capacity,
        })
    }
}

struct MemoryCacheBucket {
    entries: Arc<RwLock<Entries>>,
    capacity: Option<usize>,
}

impl CacheBucket for MemoryCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().ok()?;
        let (stored_etag, value) = entries.get(key)?;
        if !etag.is_empty() && stored_etag != etag {
            return None;
        }
        Some(value.clone())
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(capacity) = self.capacity
                && entries.len() >= capacity
                && !entries.contains_key(key)
                && let Some(evicted) = entries.keys().next().cloned()
            {
                tracing::debug!(key = %evicted, "memory cache full, evicting entry");
                entries.remove(&evicted);
            }
            entries.insert(key.to_owned(), (etag.to_owned(), value.to_vec()));
        }
    }
}
