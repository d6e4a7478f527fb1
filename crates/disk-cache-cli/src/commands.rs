//! Command-line arguments and the cache operations behind each subcommand

use crate::error::Result;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use expiring_disk_cache::{DiskCache, Expiry, ImageCodec, StringCodec};
use image::DynamicImage;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Inspect and edit an expiring disk cache.
///
/// The cache directory and budgets default to the `CACHE_DIR`, `CACHE_MAX_SIZE` and
/// `CACHE_MAX_COUNT` environment variables.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Byte budget for the cache directory
    #[arg(long, global = true)]
    pub max_size: Option<u64>,

    /// Entry-count budget for the cache directory
    #[arg(long, global = true)]
    pub max_count: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Store a UTF-8 string
    Put {
        key: String,
        value: String,
        /// Seconds until the entry expires. Never expires when omitted.
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Store the raw contents of a file
    PutFile {
        key: String,
        path: PathBuf,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Decode an image file and store it as PNG
    PutImage {
        key: String,
        path: PathBuf,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Print a stored string
    Get { key: String },
    /// Write a stored payload to a file
    GetFile { key: String, out: PathBuf },
    /// Write a stored image to a file; the format follows the extension
    GetImage { key: String, out: PathBuf },
    /// Print when an entry expires
    Ttl { key: String },
    /// Delete an entry
    Remove { key: String },
    /// Delete every entry
    Clear,
    /// Print entry count, total size and hit/miss counters as JSON
    Stats,
}

/// Whether a command found what it was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Miss,
}

/// Run `command` against `cache`, writing user-facing output to `out`
pub fn execute(cache: &DiskCache, command: Command, out: &mut impl Write) -> Result<Outcome> {
    match command {
        Command::Put {
            key,
            value,
            ttl_secs,
        } => {
            cache.put(&key, &value, &StringCodec, ttl(ttl_secs))?;
            info!(key = %key, ttl_secs, "Stored string");
        }
        Command::PutFile {
            key,
            path,
            ttl_secs,
        } => {
            let data = fs::read(&path)?;
            cache.put_bytes(&key, &data, ttl(ttl_secs))?;
            info!(key = %key, path = ?path, size = data.len(), "Stored file");
        }
        Command::PutImage {
            key,
            path,
            ttl_secs,
        } => {
            let image = image::open(&path)?;
            cache.put(&key, &image, &ImageCodec, ttl(ttl_secs))?;
            info!(
                key = %key,
                path = ?path,
                width = image.width(),
                height = image.height(),
                "Stored image"
            );
        }
        Command::Get { key } => match cache.get::<String, _>(&key, &StringCodec)? {
            Some(value) => writeln!(out, "{}", value)?,
            None => return Ok(Outcome::Miss),
        },
        Command::GetFile { key, out: path } => match cache.get_bytes(&key)? {
            Some(data) => fs::write(&path, data)?,
            None => return Ok(Outcome::Miss),
        },
        Command::GetImage { key, out: path } => {
            match cache.get::<DynamicImage, _>(&key, &ImageCodec)? {
                Some(image) => image.save(&path)?,
                None => return Ok(Outcome::Miss),
            }
        }
        Command::Ttl { key } => match cache.expires_at(&key)? {
            Some(Expiry::Never) => writeln!(out, "never")?,
            Some(Expiry::At(millis)) => {
                let when = DateTime::from_timestamp_millis(millis)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| millis.to_string());
                writeln!(out, "{}", when)?;
            }
            None => return Ok(Outcome::Miss),
        },
        Command::Remove { key } => {
            if !cache.remove(&key)? {
                return Ok(Outcome::Miss);
            }
        }
        Command::Clear => cache.clear()?,
        Command::Stats => {
            let stats = cache.stats()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
    }
    Ok(Outcome::Done)
}

fn ttl(ttl_secs: Option<u64>) -> Option<Duration> {
    ttl_secs.map(Duration::from_secs)
}
