//! Error types for the disk cache CLI

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    Cache(expiring_disk_cache::CacheError),
    Io(Box<std::io::Error>),
    Image(String),
    Json(String),
    Config(String),
    Task(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Cache(err) => write!(f, "Cache error: {}", err),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Image(msg) => write!(f, "Image error: {}", msg),
            CliError::Json(msg) => write!(f, "JSON error: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Task(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Cache(err) => Some(err),
            CliError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<expiring_disk_cache::CacheError> for CliError {
    fn from(err: expiring_disk_cache::CacheError) -> Self {
        CliError::Cache(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(Box::new(err))
    }
}

impl From<image::ImageError> for CliError {
    fn from(err: image::ImageError) -> Self {
        CliError::Image(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err.to_string())
    }
}

impl From<tracing_subscriber::filter::ParseError> for CliError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CliError {
    fn from(err: tokio::task::JoinError) -> Self {
        CliError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CliError::from(expiring_disk_cache::CacheError::Decode("bad".to_string()));
        assert_eq!(format!("{}", err), "Cache error: Decoding error: bad");
    }

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("missing CACHE_DIR".to_string());
        assert_eq!(format!("{}", err), "Configuration error: missing CACHE_DIR");
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let err = CliError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.source().is_some());
    }
}
