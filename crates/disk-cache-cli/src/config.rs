use expiring_disk_cache::CacheLimits;
use std::env;
use std::path::PathBuf;

/// Cache configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub max_size: Option<u64>,
    pub max_count: Option<usize>,
}

impl CacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache/disk"));

        let max_size = lookup("CACHE_MAX_SIZE").and_then(|s| s.parse::<u64>().ok());

        let max_count = lookup("CACHE_MAX_COUNT").and_then(|s| s.parse::<usize>().ok());

        Self {
            cache_dir,
            max_size,
            max_count,
        }
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(
        mut self,
        cache_dir: Option<PathBuf>,
        max_size: Option<u64>,
        max_count: Option<usize>,
    ) -> Self {
        if let Some(cache_dir) = cache_dir {
            self.cache_dir = cache_dir;
        }
        self.max_size = max_size.or(self.max_size);
        self.max_count = max_count.or(self.max_count);
        self
    }

    pub fn limits(&self) -> CacheLimits {
        CacheLimits::new(self.max_size, self.max_count)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
