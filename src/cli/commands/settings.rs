//! Configuration command.

use anyhow::Context;

use crate::config::{self, Config};
use crate::error::ErrorCode;

/// Print the effective configuration as TOML, optionally saving it
pub fn cmd_config(config: &Config, init: bool) -> anyhow::Result<ErrorCode> {
    print!("{}", toml::to_string_pretty(config)?);
    if init {
        config::save(config).context("Failed to save configuration")?;
        if let Some(path) = config::config_path() {
            eprintln!("Wrote {}", path.display());
        }
    }
    Ok(ErrorCode::Success)
}
