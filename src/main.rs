//! tagbridge - one canonical record for every audio tag format.
//!
//! Reads ID3v2, Vorbis comments, APE, MP4 and ASF tags into a single
//! song record and writes it back, including cover art, play count and
//! rating. Every operation is exposed as a CLI subcommand that prints
//! JSON.

pub mod cli;
pub mod config;
pub mod cover;
pub mod error;
pub mod metadata;
pub mod model;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use error::ErrorCode;

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Cli::parse();

    // Initialize logging; the config file may refine the filter below
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(config::LogConfig::default().filter)),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    if !has_env_filter && let Err(e) = filter_handle.reload(EnvFilter::new(&config.log.filter)) {
        tracing::warn!("Could not apply log filter from config: {}", e);
    }

    let code = cli::run_command(&args, &config)?;
    Ok(if code == ErrorCode::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
