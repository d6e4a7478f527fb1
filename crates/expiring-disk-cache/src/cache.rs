//! File-per-key cache storage with expiry tags and LRU eviction

use crate::clock::Clock;
use crate::codec::Codec;
use crate::error::{CacheError, Result};
use crate::tag::{self, Expiry};
use crate::tracker::{ScannedFile, UsageTracker};
use crate::types::{CacheLimits, CacheStats};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Prefix of in-flight write files; they never match an entry name
const TEMP_PREFIX: &str = ".tmp-";

/// A cache directory holding one file per key.
///
/// Obtain handles through [`crate::CacheRegistry`] so that each directory has a single
/// in-memory tracker per process.
pub struct DiskCache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// Byte and entry-count budgets
    limits: CacheLimits,
    /// Time source for expiry tags
    clock: Arc<dyn Clock>,
    /// Recency and size bookkeeping, locked only around map updates
    tracker: Mutex<UsageTracker>,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

struct Entry {
    payload: Vec<u8>,
    expiry: Expiry,
}

impl DiskCache {
    /// Open a cache in `cache_dir`, which the registry has already created
    pub(crate) fn open(
        cache_dir: impl Into<PathBuf>,
        limits: CacheLimits,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        info!(cache_dir = ?cache_dir, ?limits, "Cache opened");

        Self {
            cache_dir,
            limits,
            clock,
            tracker: Mutex::new(UsageTracker::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Name of the file backing `key`: the hex SHA-256 of the key
    pub fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Path of the file backing `key`, whether or not it exists
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(Self::file_name(key))
    }

    /// Encode `value` with `codec` and store it under `key`.
    ///
    /// With a `ttl`, the entry stops being readable once the clock passes
    /// write time plus `ttl`.
    pub fn put<T, C>(&self, key: &str, value: &T, codec: &C, ttl: Option<Duration>) -> Result<()>
    where
        C: Codec<T>,
    {
        let payload = codec.encode(value)?;
        self.put_bytes(key, &payload, ttl)
    }

    /// Store raw payload bytes under `key`
    pub fn put_bytes(&self, key: &str, payload: &[u8], ttl: Option<Duration>) -> Result<()> {
        let name = Self::file_name(key);
        let expiry = Expiry::after(self.clock.now_millis(), ttl);
        let stored = tag::tag(payload, expiry);
        let size = stored.len() as u64;

        let evict_started = SystemTime::now();
        self.write_atomic(&name, &stored)?;

        if self.limits.is_bounded() {
            self.ensure_loaded().map_err(|e| match e {
                CacheError::Read(err) => CacheError::Write(err),
                other => other,
            })?;
        }

        let victims = {
            let mut tracker = self.lock_tracker();
            let mut victims = Vec::new();
            if tracker.is_loaded() {
                tracker.record(&name, size);
                while self.limits.is_exceeded(tracker.total_size(), tracker.count()) {
                    match tracker.pop_oldest(&name) {
                        Some(victim) => victims.push(victim),
                        None => break,
                    }
                }
            }
            victims
        };

        debug!(key = %key, size, ?expiry, "Cached entry");

        for (victim, victim_size) in victims {
            self.evict(&victim, victim_size, evict_started);
        }

        Ok(())
    }

    /// Delete a file popped from the tracker, unless a concurrent put has rewritten it.
    ///
    /// A rewrite shows up as the file being tracked again or having an mtime at or
    /// after `started`. A rename landing between these checks and the delete can
    /// still be lost; the tracker then keeps the name until the next rescan.
    fn evict(&self, name: &str, size: u64, started: SystemTime) -> bool {
        let path = self.cache_dir.join(name);

        if self.lock_tracker().contains(name) {
            debug!(file = %name, "Entry rewritten during eviction, keeping it");
            return false;
        }
        match fs::metadata(&path).and_then(|metadata| metadata.modified()) {
            Ok(modified) if modified >= started => {
                debug!(file = %name, "Entry rewritten during eviction, keeping it");
                return false;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            _ => {}
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %name, size, "Evicted least recently used entry");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to evict cache entry, forcing rescan");
                self.lock_tracker().invalidate();
                false
            }
        }
    }

    /// Read and decode the value stored under `key`.
    ///
    /// Absent, expired, corrupt and undecodable entries are all reported as `Ok(None)`.
    /// Only I/O failures other than "not found" are errors.
    pub fn get<T, C>(&self, key: &str, codec: &C) -> Result<Option<T>>
    where
        C: Codec<T>,
    {
        let Some(entry) = self.read_entry(key, true)? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        match codec.decode(&entry.payload) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to decode cached value, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Like [`DiskCache::get`], falling back to `default` on any miss
    pub fn get_or<T, C>(&self, key: &str, codec: &C, default: T) -> Result<T>
    where
        C: Codec<T>,
    {
        Ok(self.get(key, codec)?.unwrap_or(default))
    }

    /// Read the raw payload stored under `key`
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.read_entry(key, true)? {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.payload))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Expiry of a live entry, without counting as an access
    pub fn expires_at(&self, key: &str) -> Result<Option<Expiry>> {
        Ok(self.read_entry(key, false)?.map(|entry| entry.expiry))
    }

    /// Delete the entry for `key`. Returns false if there was none.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.remove_file(&Self::file_name(key))?;
        if removed {
            debug!(key = %key, "Removed cache entry");
        }
        Ok(removed)
    }

    /// Delete every file in the cache directory
    pub fn clear(&self) -> Result<()> {
        let mut removed = 0usize;
        let mut first_error = None;

        for entry in fs::read_dir(&self.cache_dir).map_err(CacheError::Write)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut tracker = self.lock_tracker();
        match first_error {
            None => {
                tracker.reset();
                info!(cache_dir = ?self.cache_dir, removed, "Cache cleared");
                Ok(())
            }
            Some(e) => {
                tracker.invalidate();
                warn!(
                    cache_dir = ?self.cache_dir,
                    removed,
                    error = %e,
                    "Cache only partially cleared"
                );
                Err(CacheError::Write(e))
            }
        }
    }

    /// Total bytes of all entry files, tags included
    pub fn size(&self) -> Result<u64> {
        self.ensure_loaded()?;
        Ok(self.lock_tracker().total_size())
    }

    /// Number of entry files
    pub fn count(&self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(self.lock_tracker().count())
    }

    /// Get current cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        self.ensure_loaded()?;
        let tracker = self.lock_tracker();
        Ok(CacheStats {
            entries: tracker.count(),
            total_size: tracker.total_size(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    /// Rebuild the in-memory bookkeeping from the directory contents.
    ///
    /// Needed only when another process has changed the directory.
    pub fn rescan(&self) -> Result<()> {
        let files = self.scan()?;
        self.lock_tracker().load(files);
        Ok(())
    }

    fn read_entry(&self, key: &str, touch: bool) -> Result<Option<Entry>> {
        let name = Self::file_name(key);
        let path = self.cache_dir.join(&name);

        let stored = match fs::read(&path) {
            Ok(stored) => stored,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::Read(e)),
        };

        let Some(untagged) = tag::untag(&stored, self.clock.now_millis()) else {
            warn!(
                key = %key,
                path = ?path,
                "Cache file has a corrupt expiry tag, treating as miss"
            );
            return Ok(None);
        };

        if untagged.expired {
            debug!(key = %key, expiry = ?untagged.expiry, "Cache entry expired");
            if let Err(e) = self.remove_file(&name) {
                warn!(key = %key, error = %e, "Failed to delete expired cache entry");
            }
            return Ok(None);
        }

        if touch {
            {
                let mut tracker = self.lock_tracker();
                if tracker.is_loaded() && !tracker.touch(&name) {
                    // Written by another process since the last scan
                    tracker.record(&name, stored.len() as u64);
                }
            }
            // Keeps recency meaningful across restarts
            if let Err(e) = filetime::set_file_mtime(&path, FileTime::now()) {
                debug!(key = %key, error = %e, "Failed to refresh cache file mtime");
            }
            debug!(key = %key, "Cache hit");
        }

        Ok(Some(Entry {
            payload: untagged.payload.to_vec(),
            expiry: untagged.expiry,
        }))
    }

    fn write_atomic(&self, name: &str, stored: &[u8]) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(CacheError::Write)?;
        file.write_all(stored).map_err(CacheError::Write)?;
        file.as_file().sync_all().map_err(CacheError::Write)?;
        // A failed persist drops the temp file, which deletes it
        file.persist(self.cache_dir.join(name))
            .map_err(|e| CacheError::Write(e.error))?;
        Ok(())
    }

    fn remove_file(&self, name: &str) -> Result<bool> {
        let removed = match fs::remove_file(self.cache_dir.join(name)) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(CacheError::Write(e)),
        };
        self.lock_tracker().forget(name);
        Ok(removed)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.lock_tracker().is_loaded() {
            return Ok(());
        }

        let files = self.scan()?;
        let mut tracker = self.lock_tracker();
        if !tracker.is_loaded() {
            debug!(
                cache_dir = ?self.cache_dir,
                files = files.len(),
                "Loaded cache bookkeeping from disk"
            );
            tracker.load(files);
        }
        Ok(())
    }

    fn scan(&self) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.cache_dir).map_err(CacheError::Read)? {
            let entry = entry.map_err(CacheError::Read)?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_entry_name(&name) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::Read(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(ScannedFile {
                name,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(files)
    }

    fn lock_tracker(&self) -> MutexGuard<'_, UsageTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_entry_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
