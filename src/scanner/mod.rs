//! Library scanning.
//!
//! Walks a directory tree for files with a configured audio extension and
//! reads each one in parallel. Every file is an independent read; one
//! failure never stops the scan.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ErrorCode;
use crate::metadata;
use crate::model::SongMetadata;

/// Outcome of reading one scanned file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub code: ErrorCode,
    /// Present only when the read succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<SongMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanEntry {
    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Success
    }
}

/// Whether the extension is one of the configured audio extensions
/// (case-insensitive).
pub fn has_audio_extension(path: &Path, config: &ScanConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Every audio file under `root`, sorted by path.
pub fn collect_files(root: &Path, config: &ScanConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(config.follow_links)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(target: "scanner", error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_audio_extension(path, config))
        .collect();
    files.sort();
    files
}

/// Read every audio file under `root`.
pub fn scan(root: &Path, config: &ScanConfig) -> Vec<ScanEntry> {
    let files = collect_files(root, config);
    info!(target: "scanner", root = %root.display(), files = files.len(), "Scanning");

    let entries: Vec<ScanEntry> = files
        .into_par_iter()
        .map(|path| {
            let mut song = SongMetadata::default();
            let result = metadata::read_file(&path, &mut song);
            let code = ErrorCode::from_result(&result);
            match result {
                Ok(()) => ScanEntry {
                    path,
                    code,
                    song: Some(song),
                    error: None,
                },
                Err(e) => {
                    debug!(target: "scanner", path = %path.display(), error = %e, "Read failed");
                    ScanEntry {
                        path,
                        code,
                        song: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    let failed = entries.iter().filter(|e| !e.is_ok()).count();
    info!(
        target: "scanner",
        root = %root.display(),
        read = entries.len() - failed,
        failed,
        "Scan complete"
    );
    entries
}
