//! Directory-backed cache.
//!
//! Keys are hashed into a two-level layout so arbitrary key strings (document
//! paths, digests) map to safe file names:
//!
//! ```text
//! {root}/
//! +-- VERSION
//! +-- html/                 # bucket
//!     +-- 3f/               # first two hex digits of the key hash
//!         +-- 3fa9...e1     # entry
//! ```
//!
//! An entry is the hex-encoded etag, a newline, then the raw value. Writes go
//! to a sibling temp file and are renamed into place, so a concurrent reader
//! sees either the old entry or the new one.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::{Cache, CacheBucket, content_key};

/// File-based [`Cache`] rooted at a directory.
///
/// A `VERSION` file in the root ties the cache to the code that wrote it. A
/// missing or different version wipes the directory on construction.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open the cache at `root`, wiping it if its version differs.
    ///
    /// I/O failures are logged and leave the cache usable (it simply misses).
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        ensure_version(&root, version);
        Self { root }
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = content_key(&[key]);
        self.dir.join(&hash[..2]).join(hash)
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        let mut reader = BufReader::new(File::open(self.entry_path(key)).ok()?);

        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header).ok()?;
        if header.pop() != Some(b'\n') {
            return None;
        }
        let stored_etag = hex::decode(&header).ok()?;
        if !etag.is_empty() && stored_etag != etag.as_bytes() {
            return None;
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let path = self.entry_path(key);
        let Some(parent) = path.parent() else {
            return;
        };
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!(error = %e, dir = %parent.display(), "cannot create cache directory");
            return;
        }

        let mut buf = hex::encode(etag).into_bytes();
        buf.push(b'\n');
        buf.extend_from_slice(value);

        let tmp = path.with_extension("tmp");
        let written = fs::write(&tmp, &buf).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            tracing::debug!(error = %e, path = %path.display(), "cannot write cache entry");
            let _ = fs::remove_file(&tmp);
        }
    }
}

fn ensure_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored.trim() == version => {
            tracing::debug!(version, "cache version matches");
            return;
        }
        Ok(stored) => {
            tracing::info!(stored = stored.trim(), current = version, "cache version changed, wiping cache");
        }
        Err(_) => {
            tracing::info!(root = %root.display(), "initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!(error = %e, "failed to remove cache directory");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!(error = %e, "failed to create cache directory");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!(error = %e, "failed to write cache VERSION file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(tmp: &TempDir, version: &str) -> FileCache {
        FileCache::new(tmp.path().join("cache"), version)
    }

    #[test]
    fn test_set_and_get() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "v1").bucket("html");

        bucket.set("docs/guide.md", "etag1", b"<p>guide</p>");
        assert_eq!(
            bucket.get("docs/guide.md", "etag1"),
            Some(b"<p>guide</p>".to_vec())
        );
        assert_eq!(bucket.get("docs/guide.md", "etag2"), None);
        assert_eq!(bucket.get("docs/guide.md", ""), Some(b"<p>guide</p>".to_vec()));
    }

    #[test]
    fn test_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "v1").bucket("html");
        assert_eq!(bucket.get("nope", "etag"), None);
    }

    #[test]
    fn test_etag_with_newline_and_binary_value() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "v1").bucket("html");
        let value = vec![0x00, b'\n', 0xFF, 0x0D];

        bucket.set("k", "line one\nline two", &value);
        assert_eq!(bucket.get("k", "line one\nline two"), Some(value));
    }

    #[test]
    fn test_entries_are_sharded_by_key_hash() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp, "v1");
        cache.bucket("html").set("k", "e", b"x");

        let hash = content_key(&["k"]);
        let path = cache.root().join("html").join(&hash[..2]).join(&hash);
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_same_version_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        open(&tmp, "v1").bucket("html").set("k", "e", b"kept");
        assert_eq!(open(&tmp, "v1").bucket("html").get("k", "e"), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_new_version_wipes_entries() {
        let tmp = TempDir::new().unwrap();
        open(&tmp, "v1").bucket("html").set("k", "e", b"stale");

        let cache = open(&tmp, "v2");
        assert_eq!(cache.bucket("html").get("k", "e"), None);
        let version = fs::read_to_string(cache.root().join("VERSION")).unwrap();
        assert_eq!(version, "v2");
    }

    #[test]
    fn test_nested_root_is_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("a/b/cache");
        let _cache = FileCache::new(root.clone(), "v1");
        assert!(root.join("VERSION").exists());
    }
}
