//! Error types for the disk cache

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CacheError {
    /// Writing, renaming or deleting a cache file failed
    Write(io::Error),
    /// Reading a cache file failed for a reason other than it being absent
    Read(io::Error),
    /// A value could not be encoded by its codec
    Encode(String),
    /// Stored bytes could not be decoded by the requested codec
    Decode(String),
    /// The cache directory could not be created or resolved
    CreateDir { path: PathBuf, source: io::Error },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Write(err) => write!(f, "Cache write error: {}", err),
            CacheError::Read(err) => write!(f, "Cache read error: {}", err),
            CacheError::Encode(msg) => write!(f, "Encoding error: {}", msg),
            CacheError::Decode(msg) => write!(f, "Decoding error: {}", msg),
            CacheError::CreateDir { path, source } => {
                write!(f, "Can't create cache dir {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Write(err) | CacheError::Read(err) => Some(err),
            CacheError::CreateDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
