//! One cache handle per directory

use crate::cache::DiskCache;
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::types::CacheLimits;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Name used by [`CacheRegistry::open_named`] when given a blank name
pub const DEFAULT_CACHE_NAME: &str = "disk-cache";

/// Hands out [`DiskCache`] handles, at most one per canonical directory path.
///
/// Two handles on the same directory would keep independent LRU bookkeeping and
/// evict behind each other's backs, so everything that shares a directory should
/// share a registry.
pub struct CacheRegistry {
    /// Parent directory for named caches
    base_dir: PathBuf,
    clock: Arc<dyn Clock>,
    caches: Mutex<HashMap<PathBuf, Arc<DiskCache>>>,
}

impl CacheRegistry {
    /// A registry using the system clock, with named caches under the OS temp dir
    pub fn new() -> Self {
        Self::with_base_dir(std::env::temp_dir())
    }

    /// A registry whose named caches live under `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            clock: Arc::new(SystemClock),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Use `clock` for every cache opened from now on
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the handle for `cache_dir`, creating the directory and handle on first use.
    ///
    /// `limits` only apply when the handle is created; later calls get the existing
    /// handle with its original limits.
    pub fn open(&self, cache_dir: impl AsRef<Path>, limits: CacheLimits) -> Result<Arc<DiskCache>> {
        let cache_dir = canonical_dir(cache_dir.as_ref())?;

        let mut caches = self.lock_caches();
        if let Some(cache) = caches.get(&cache_dir) {
            if cache.limits() != limits {
                debug!(
                    cache_dir = ?cache_dir,
                    existing = ?cache.limits(),
                    requested = ?limits,
                    "Reusing cache with its original limits"
                );
            }
            return Ok(Arc::clone(cache));
        }

        let clock = Arc::clone(&self.clock);
        let cache = Arc::new(DiskCache::open(cache_dir.clone(), limits, clock));
        caches.insert(cache_dir, Arc::clone(&cache));
        Ok(cache)
    }

    /// Open the cache called `name` under the base directory
    pub fn open_named(&self, name: &str, limits: CacheLimits) -> Result<Arc<DiskCache>> {
        let name = name.trim();
        let name = if name.is_empty() { DEFAULT_CACHE_NAME } else { name };
        self.open(self.base_dir.join(name), limits)
    }

    /// Drop the registry's handle for `cache_dir`, returning it if there was one.
    ///
    /// Files are left alone. Handles still held elsewhere keep working, so only
    /// invalidate a directory nobody else is using. Works after the directory itself
    /// has been deleted, as long as its parent still resolves.
    pub fn invalidate(&self, cache_dir: impl AsRef<Path>) -> Option<Arc<DiskCache>> {
        let cache_dir = lookup_dir(cache_dir.as_ref());
        self.lock_caches().remove(&cache_dir)
    }

    /// Number of open handles
    pub fn len(&self) -> usize {
        self.lock_caches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_caches(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<DiskCache>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    let create_dir_error = |source| CacheError::CreateDir {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).map_err(create_dir_error)?;
    fs::canonicalize(path).map_err(create_dir_error)
}

/// Best-effort canonical form of a directory that may no longer exist
fn lookup_dir(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::StringCodec;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_same_directory_shares_handle() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::new();

        let cache1 = registry.open(dir.path().join("cache1"), CacheLimits::default()).unwrap();
        let cache2 = registry
            .open(dir.path().join("cache1").join("."), CacheLimits::default())
            .unwrap();
        let other = registry.open(dir.path().join("cache2"), CacheLimits::default()).unwrap();

        assert!(Arc::ptr_eq(&cache1, &cache2));
        assert!(!Arc::ptr_eq(&cache1, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::new();
        let nested = dir.path().join("a").join("b").join("c");

        let cache = registry.open(&nested, CacheLimits::default()).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.cache_dir(), fs::canonicalize(&nested).unwrap());
    }

    #[test]
    fn test_existing_handle_keeps_its_limits() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::new();

        let first = registry
            .open(dir.path(), CacheLimits::new(Some(1024), Some(10)))
            .unwrap();
        let second = registry.open(dir.path(), CacheLimits::default()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.limits(), CacheLimits::new(Some(1024), Some(10)));
    }

    #[test]
    fn test_open_named_under_base_dir() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::with_base_dir(dir.path());

        let named = registry.open_named("thumbnails", CacheLimits::default()).unwrap();
        assert!(dir.path().join("thumbnails").is_dir());

        let blank = registry.open_named("  ", CacheLimits::default()).unwrap();
        let default = registry.open_named(DEFAULT_CACHE_NAME, CacheLimits::default()).unwrap();
        assert!(Arc::ptr_eq(&blank, &default));
        assert!(!Arc::ptr_eq(&named, &default));
    }

    #[test]
    fn test_registry_clock_drives_expiry() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(10_000));
        let registry = CacheRegistry::with_base_dir(dir.path()).with_clock(clock.clone());
        let cache = registry.open_named("ttl", CacheLimits::default()).unwrap();

        cache
            .put("k", &"v".to_string(), &StringCodec, Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));
        assert!(cache.get::<String, _>("k", &StringCodec).unwrap().is_none());
    }

    #[test]
    fn test_invalidate_drops_handle() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::new();

        let before = registry.open(dir.path(), CacheLimits::default()).unwrap();
        before.put_bytes("k", b"v", None).unwrap();

        assert!(registry.invalidate(dir.path()).is_some());
        assert!(registry.is_empty());
        assert!(registry.invalidate(dir.path()).is_none());

        let after = registry.open(dir.path(), CacheLimits::default()).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.get_bytes("k").unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn test_invalidate_after_directory_deleted() {
        let dir = tempdir().unwrap();
        let registry = CacheRegistry::new();
        let cache_dir = dir.path().join("removed");

        registry.open(&cache_dir, CacheLimits::default()).unwrap();
        fs::remove_dir_all(&cache_dir).unwrap();

        assert!(registry.invalidate(&cache_dir).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_open_fails_when_path_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let registry = CacheRegistry::new();
        let result = registry.open(&file, CacheLimits::default());
        assert!(matches!(result, Err(CacheError::CreateDir { .. })));
    }
}
