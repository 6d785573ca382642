//! CLI command definitions and dispatch.
//!
//! Each group of subcommands is implemented in its own submodule:
//! - `tags`: reading and writing the canonical record, play count, rating
//! - `art`: embedded cover art
//! - `scan`: directory scans and media checks
//! - `settings`: the configuration file

mod art;
mod scan;
mod settings;
mod tags;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{self, ErrorCode};
use crate::model::SaveFields;

pub use art::{cmd_art, cmd_set_art};
pub use scan::{cmd_check, cmd_scan};
pub use settings::cmd_config;
pub use tags::{cmd_playcount, cmd_rating, cmd_read, cmd_write};

/// tagbridge CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "TAGBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Field groups accepted by `write --fields`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldGroup {
    Tags,
    Playcount,
    Rating,
    Cover,
}

impl FieldGroup {
    pub fn flag(self) -> SaveFields {
        match self {
            Self::Tags => SaveFields::TAGS,
            Self::Playcount => SaveFields::PLAYCOUNT,
            Self::Rating => SaveFields::RATING,
            Self::Cover => SaveFields::COVER,
        }
    }

    /// Combine the selected groups into one set.
    pub fn combine(groups: &[FieldGroup]) -> SaveFields {
        groups
            .iter()
            .fold(SaveFields::empty(), |acc, group| acc | group.flag())
    }
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Read a file's tags and print them as JSON
    Read {
        /// Path to the audio file
        path: PathBuf,
    },
    /// Write tags from a JSON record
    Write {
        /// Path to the audio file
        path: PathBuf,
        /// JSON record to write ("-" reads stdin)
        #[arg(long, default_value = "-")]
        record: PathBuf,
        /// Field groups to write
        #[arg(long, value_enum, value_delimiter = ',', default_value = "tags")]
        fields: Vec<FieldGroup>,
        /// Image to embed when writing the cover group (omit to remove it)
        #[arg(long)]
        cover: Option<PathBuf>,
    },
    /// Extract the embedded front cover
    Art {
        /// Path to the audio file
        path: PathBuf,
        /// Write the image here instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace or remove the embedded front cover
    SetArt {
        /// Path to the audio file
        path: PathBuf,
        /// Image file to embed; omit to remove the cover
        image: Option<PathBuf>,
        /// MIME type of the image (sniffed when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Store the play count (0 removes it)
    Playcount {
        /// Path to the audio file
        path: PathBuf,
        count: u32,
    },
    /// Store the rating, 0.0 to 1.0 (0 removes it, negative is ignored)
    Rating {
        /// Path to the audio file
        path: PathBuf,
        #[arg(allow_hyphen_values = true)]
        rating: f32,
    },
    /// Read every audio file under a directory
    Scan {
        /// Directory to scan
        path: PathBuf,
        /// Print only counts per status code
        #[arg(long)]
        summary: bool,
    },
    /// Report whether a file is a supported audio file
    Check {
        /// Path to check
        path: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the default location
        #[arg(long)]
        init: bool,
    },
}

/// Run the specified CLI command, returning the status code it reported.
pub fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<ErrorCode> {
    match &cli.command {
        Commands::Read { path } => cmd_read(path),
        Commands::Write {
            path,
            record,
            fields,
            cover,
        } => cmd_write(
            path,
            record,
            FieldGroup::combine(fields),
            cover.as_deref(),
            &config.write,
        ),
        Commands::Art { path, output } => cmd_art(path, output.as_deref()),
        Commands::SetArt { path, image, mime } => {
            cmd_set_art(path, image.as_deref(), mime.clone(), &config.write)
        }
        Commands::Playcount { path, count } => cmd_playcount(path, *count, &config.write),
        Commands::Rating { path, rating } => cmd_rating(path, *rating, &config.write),
        Commands::Scan { path, summary } => cmd_scan(path, *summary, &config.scan),
        Commands::Check { path } => cmd_check(path),
        Commands::Config { init } => cmd_config(config, *init),
    }
}

// ============================================================================
// Output helpers
// ============================================================================

/// Status line printed by commands that produce no other data.
#[derive(Debug, Serialize)]
struct Status {
    path: PathBuf,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Status {
    fn from_result<T>(path: &std::path::Path, result: &error::Result<T>) -> Self {
        Self {
            path: path.to_path_buf(),
            code: ErrorCode::from_result(result),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the status of an operation and pass its code on.
fn report<T>(path: &std::path::Path, result: &error::Result<T>) -> anyhow::Result<ErrorCode> {
    let status = Status::from_result(path, result);
    print_json(&status)?;
    Ok(status.code)
}
