//! Cache abstraction layer for Lumen.
//!
//! Rendering is pure, so every stage can be memoized by the exact text it was
//! fed. This crate keeps the storage side of that out of the renderer:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Key-value store with etag-based invalidation
//!
//! # Implementations
//!
//! - [`NullCache`]: Always misses (caching disabled)
//! - [`MemoryCache`]: Process-local, shared between bucket handles
//! - [`FileCache`]: Directory on disk, stamped with a version
//!
//! # Example
//!
//! ```
//! use lumen_cache::{Cache, MemoryCache, content_key};
//!
//! let cache = MemoryCache::new();
//! let bucket = cache.bucket("documents");
//! let key = content_key(&["gfm", "# Title"]);
//! bucket.set(&key, "v1", b"<h1>Title</h1>");
//! assert_eq!(bucket.get(&key, "v1"), Some(b"<h1>Title</h1>".to_vec()));
//! ```

mod ext;
mod file;
mod memory;

use sha2::{Digest, Sha256};

pub use ext::CacheBucketExt;
pub use file::FileCache;
pub use memory::MemoryCache;

/// A named partition within a [`Cache`].
///
/// A hit requires both the key and the etag to match. The etag is opaque to the
/// cache; callers use it to tie an entry to the code or settings that produced
/// it.
pub trait CacheBucket: Send + Sync {
    /// Retrieve a cached value.
    ///
    /// An empty `etag` skips etag validation.
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any existing entry for `key`.
    fn set(&self, key: &str, etag: &str, value: &[u8]);
}

/// Factory for named cache [`CacheBucket`]s.
///
/// Buckets with different names never see each other's entries. Handles for
/// the same name share storage.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// No-op [`CacheBucket`]: every `get` misses, every `set` is dropped.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str, _etag: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _etag: &str, _value: &[u8]) {}
}

/// No-op [`Cache`] used when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}

/// Compute a content-addressed cache key.
///
/// SHA-256 over the parts joined with a NUL separator, hex encoded. The
/// separator keeps `["ab", "c"]` and `["a", "bc"]` apart.
#[must_use]
pub fn content_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
