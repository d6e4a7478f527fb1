//! Cache types

use serde::{Deserialize, Serialize};

/// Byte and entry-count budgets for one cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimits {
    pub max_size: u64,
    pub max_count: usize,
}

impl CacheLimits {
    pub fn new(max_size: Option<u64>, max_count: Option<usize>) -> Self {
        Self {
            max_size: max_size.unwrap_or(u64::MAX),
            max_count: max_count.unwrap_or(usize::MAX),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_size != u64::MAX || self.max_count != usize::MAX
    }

    pub fn is_exceeded(&self, total_size: u64, count: usize) -> bool {
        total_size > self.max_size || count > self.max_count
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
