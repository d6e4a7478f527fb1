//! disk-cache - command-line front end for the expiring disk cache
//!
//! Opens one cache directory and runs a single subcommand against it. Cache calls are
//! blocking file I/O, so they run on tokio's blocking pool.

mod commands;
mod config;
mod error;

use crate::commands::{execute, Cli, Outcome};
use crate::config::CacheConfig;
use crate::error::Result;
use clap::Parser;
use expiring_disk_cache::CacheRegistry;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("disk_cache=info".parse()?)
        .add_directive("expiring_disk_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    // Load configuration from environment, flags win
    let config =
        CacheConfig::from_env().with_overrides(cli.cache_dir, cli.max_size, cli.max_count);
    info!("Cache dir: {:?}", config.cache_dir);
    info!(
        max_size = ?config.max_size,
        max_count = ?config.max_count,
        "Cache limits"
    );

    let command = cli.command;
    let outcome = tokio::task::spawn_blocking(move || -> Result<Outcome> {
        let registry = CacheRegistry::new();
        let cache = registry.open(&config.cache_dir, config.limits())?;
        let mut stdout = std::io::stdout().lock();
        execute(&cache, command, &mut stdout)
    })
    .await??;

    Ok(match outcome {
        Outcome::Done => ExitCode::SUCCESS,
        Outcome::Miss => ExitCode::from(1),
    })
}
