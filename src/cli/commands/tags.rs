//! Tag reading and writing commands.

use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

use super::{print_json, report};
use crate::config::WriteConfig;
use crate::cover::CoverRequest;
use crate::error::ErrorCode;
use crate::metadata;
use crate::model::{SaveFields, SongMetadata};

#[derive(Serialize)]
struct ReadOutput<'a> {
    path: &'a Path,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    song: Option<SongMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Read a file and print its record
pub fn cmd_read(path: &Path) -> anyhow::Result<ErrorCode> {
    let mut song = SongMetadata::default();
    let result = metadata::read_file(path, &mut song);
    let code = ErrorCode::from_result(&result);

    let output = match result {
        Ok(()) => ReadOutput {
            path,
            code,
            song: Some(song),
            error: None,
        },
        Err(e) => ReadOutput {
            path,
            code,
            song: None,
            error: Some(e.to_string()),
        },
    };
    print_json(&output)?;
    Ok(code)
}

/// Load a JSON record from a file, or stdin for "-"
fn load_record(source: &Path) -> anyhow::Result<SongMetadata> {
    if source == Path::new("-") {
        return serde_json::from_reader(io::stdin().lock()).context("Failed to parse record from stdin");
    }
    let file = File::open(source)
        .with_context(|| format!("Failed to open record {}", source.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse record {}", source.display()))
}

/// Write the selected field groups from a JSON record
pub fn cmd_write(
    path: &Path,
    record: &Path,
    fields: SaveFields,
    cover: Option<&Path>,
    config: &WriteConfig,
) -> anyhow::Result<ErrorCode> {
    let song = load_record(record)?;
    debug!(target: "cli::write", path = %path.display(), fields = ?fields, "Writing record");

    let request = cover.map(CoverRequest::from_file);
    let result = metadata::write_file(path, &song, fields, request.as_ref(), config);
    report(path, &result)
}

/// Store the play count
pub fn cmd_playcount(path: &Path, count: u32, config: &WriteConfig) -> anyhow::Result<ErrorCode> {
    let result = metadata::save_song_playcount_to_file(path, count, config);
    report(path, &result)
}

/// Store the rating
pub fn cmd_rating(path: &Path, rating: f32, config: &WriteConfig) -> anyhow::Result<ErrorCode> {
    let result = metadata::save_song_rating_to_file(path, rating, config);
    report(path, &result)
}
