//! File-per-key disk cache with per-entry TTL expiration and LRU eviction
//!
//! Every key is stored in its own file inside a cache directory. The file name is the
//! SHA-256 of the key and the file content is a fixed-width expiry tag followed by the
//! payload produced by a [`Codec`]. Reads treat expired, corrupt or undecodable entries
//! as misses; writes go through a temp file and an atomic rename.
//!
//! # Example
//!
//! ```no_run
//! use expiring_disk_cache::{CacheLimits, CacheRegistry, JsonCodec, StringCodec};
//! use std::time::Duration;
//!
//! # fn example() -> expiring_disk_cache::Result<()> {
//! let registry = CacheRegistry::new();
//! let cache = registry.open("/tmp/my-cache", CacheLimits::default())?;
//!
//! cache.put("greeting", &"hello".to_string(), &StringCodec, Some(Duration::from_secs(60)))?;
//! let greeting: Option<String> = cache.get("greeting", &StringCodec)?;
//! assert_eq!(greeting.as_deref(), Some("hello"));
//!
//! let tags = vec!["a".to_string(), "b".to_string()];
//! cache.put("tags", &tags, &JsonCodec, None)?;
//! let tags: Vec<String> = cache.get_or("tags", &JsonCodec, Vec::new())?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod clock;
mod codec;
mod error;
mod registry;
mod tag;
mod tracker;
mod types;

pub use cache::DiskCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{BytesCodec, Codec, ImageCodec, JsonCodec, StringCodec};
pub use error::{CacheError, Result};
pub use registry::{CacheRegistry, DEFAULT_CACHE_NAME};
pub use tag::{Expiry, TAG_LEN};
pub use types::{CacheLimits, CacheStats};
