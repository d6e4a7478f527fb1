//! In-memory recency and size bookkeeping used to pick eviction victims
//!
//! The file system stays the source of truth. The tracker is filled from a directory
//! scan the first time it is needed and kept up to date by puts, gets and removals.
//! Recency is a logical access counter, so ordering stays exact even when many
//! accesses land in the same clock tick.

use std::collections::HashMap;
use std::time::SystemTime;

/// A cache file found by a directory scan
#[derive(Debug, Clone)]
pub(crate) struct ScannedFile {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Copy)]
struct Usage {
    size: u64,
    last_access: u64,
}

#[derive(Debug, Default)]
pub(crate) struct UsageTracker {
    entries: HashMap<String, Usage>,
    total_size: u64,
    next_access: u64,
    /// Whether `entries` reflects the directory. Distinct from emptiness: an empty
    /// directory is loaded with zero entries.
    loaded: bool,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace all bookkeeping with the result of a directory scan.
    ///
    /// Files are ranked by modification time, oldest first, so the first eviction after
    /// a cold start approximates the recency order of the previous process.
    pub fn load(&mut self, mut files: Vec<ScannedFile>) {
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

        self.entries.clear();
        self.total_size = 0;
        self.next_access = 0;
        for file in files {
            let last_access = self.bump();
            self.total_size += file.size;
            self.entries.insert(
                file.name,
                Usage {
                    size: file.size,
                    last_access,
                },
            );
        }
        self.loaded = true;
    }

    /// Forget everything and mark the tracker empty but trusted
    pub fn reset(&mut self) {
        self.entries.clear();
        self.total_size = 0;
        self.loaded = true;
    }

    /// Forget everything; the next user has to rescan
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.total_size = 0;
        self.loaded = false;
    }

    /// Record a freshly written file, replacing any previous size for it
    pub fn record(&mut self, name: &str, size: u64) {
        let last_access = self.bump();
        let previous = self
            .entries
            .insert(name.to_string(), Usage { size, last_access });
        if let Some(previous) = previous {
            self.total_size -= previous.size;
        }
        self.total_size += size;
    }

    /// Mark a file as just used. Returns false if it isn't tracked.
    pub fn touch(&mut self, name: &str) -> bool {
        let last_access = self.bump();
        match self.entries.get_mut(name) {
            Some(usage) => {
                usage.last_access = last_access;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Stop tracking a file, returning its recorded size
    pub fn forget(&mut self, name: &str) -> Option<u64> {
        let usage = self.entries.remove(name)?;
        self.total_size -= usage.size;
        Some(usage.size)
    }

    /// Remove and return the least recently used file other than `keep`
    pub fn pop_oldest(&mut self, keep: &str) -> Option<(String, u64)> {
        let oldest = self
            .entries
            .iter()
            .filter(|(name, _)| name.as_str() != keep)
            .min_by_key(|(_, usage)| usage.last_access)
            .map(|(name, _)| name.clone())?;
        let size = self.forget(&oldest)?;
        Some((oldest, size))
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    fn bump(&mut self) -> u64 {
        let access = self.next_access;
        self.next_access += 1;
        access
    }
}
