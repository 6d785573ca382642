//! Directory scanning and media checks.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::print_json;
use crate::config::ScanConfig;
use crate::error::ErrorCode;
use crate::metadata;
use crate::scanner;

#[derive(Serialize)]
struct ScanSummary<'a> {
    root: &'a Path,
    files: usize,
    codes: BTreeMap<String, usize>,
}

/// Scan a directory and print every entry, or a count per status code
pub fn cmd_scan(path: &Path, summary: bool, config: &ScanConfig) -> anyhow::Result<ErrorCode> {
    if !path.is_dir() {
        anyhow::bail!("Not a directory: {}", path.display());
    }

    let entries = scanner::scan(path, config);
    if summary {
        let mut codes = BTreeMap::new();
        for entry in &entries {
            *codes.entry(format!("{:?}", entry.code)).or_insert(0) += 1;
        }
        print_json(&ScanSummary {
            root: path,
            files: entries.len(),
            codes,
        })?;
    } else {
        print_json(&entries)?;
    }
    Ok(ErrorCode::Success)
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    path: &'a Path,
    media: bool,
}

/// Report whether a file opens as supported audio
pub fn cmd_check(path: &Path) -> anyhow::Result<ErrorCode> {
    let media = metadata::is_media_file(path);
    print_json(&CheckOutput { path, media })?;
    Ok(if media {
        ErrorCode::Success
    } else {
        ErrorCode::Unsupported
    })
}
