//! Typed helpers on top of raw-byte [`CacheBucket`]s.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// Typed convenience methods for [`CacheBucket`].
///
/// Implemented for every bucket through a blanket impl, so bucket
/// implementations only deal in bytes and stay object-safe.
///
/// # Example
///
/// ```
/// use lumen_cache::{Cache, CacheBucketExt, MemoryCache};
///
/// let cache = MemoryCache::new();
/// let bucket = cache.bucket("documents");
///
/// let n: u32 = bucket.get_or_insert_json_with("answer", "v1", || 42);
/// assert_eq!(n, 42);
/// assert_eq!(bucket.get_json::<u32>("answer", "v1"), Some(42));
/// ```
pub trait CacheBucketExt: CacheBucket {
    /// Retrieve a JSON value. Misses on etag mismatch or bad JSON.
    fn get_json<T: DeserializeOwned>(&self, key: &str, etag: &str) -> Option<T> {
        let bytes = self.get(key, etag)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value as JSON. Serialization failures are dropped.
    fn set_json<T: Serialize>(&self, key: &str, etag: &str, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, etag, &bytes);
        }
    }

    /// Return the cached JSON value, or compute, store and return it.
    fn get_or_insert_json_with<T, F>(&self, key: &str, etag: &str, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get_json(key, etag) {
            tracing::debug!(key, "cache hit");
            return hit;
        }
        tracing::debug!(key, "cache miss");
        let value = compute();
        self.set_json(key, etag, &value);
        value
    }

    /// Retrieve a UTF-8 string. Misses on invalid UTF-8.
    fn get_string(&self, key: &str, etag: &str) -> Option<String> {
        let bytes = self.get(key, etag)?;
        String::from_utf8(bytes).ok()
    }

    /// Store a string value.
    fn set_string(&self, key: &str, etag: &str, value: &str) {
        self.set(key, etag, value.as_bytes());
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cache, MemoryCache, NullCache};

    #[test]
    fn test_get_or_insert_computes_once() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("documents");
        let mut calls = 0;

        let first: String = bucket.get_or_insert_json_with("k", "v1", || {
            calls += 1;
            "value".to_owned()
        });
        let second: String = bucket.get_or_insert_json_with("k", "v1", || {
            calls += 1;
            "other".to_owned()
        });

        assert_eq!(first, "value");
        assert_eq!(second, "value");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_get_or_insert_with_null_cache_always_computes() {
        let bucket = NullCache.bucket("documents");
        let a: u8 = bucket.get_or_insert_json_with("k", "", || 1);
        let b: u8 = bucket.get_or_insert_json_with("k", "", || 2);
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_get_json_rejects_garbage() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("documents");
        bucket.set("k", "v1", b"not json");
        assert_eq!(bucket.get_json::<u32>("k", "v1"), None);
    }

    #[test]
    fn test_string_helpers() {
        let cache = MemoryCache::new();
        let bucket = cache.bucket("html");
        bucket.set_string("page", "e", "<p>hi</p>");
        assert_eq!(bucket.get_string("page", "e").as_deref(), Some("<p>hi</p>"));

        bucket.set("bad", "e", &[0xFF, 0xFE]);
        assert_eq!(bucket.get_string("bad", "e"), None);
    }
}
