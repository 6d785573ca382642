//! Embedded cover art commands.

use anyhow::Context;
use serde::Serialize;
use std::path::Path;

use super::{print_json, report};
use crate::config::WriteConfig;
use crate::cover::{self, CoverRequest};
use crate::error::ErrorCode;

#[derive(Serialize)]
struct ArtOutput<'a> {
    path: &'a Path,
    code: ErrorCode,
    found: bool,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written_to: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Extract the front cover, optionally saving it to `output`
pub fn cmd_art(path: &Path, output: Option<&Path>) -> anyhow::Result<ErrorCode> {
    let result = cover::load_embedded_art(path);
    let code = ErrorCode::from_result(&result);

    let summary = match result {
        Ok(art) => {
            let data = art.unwrap_or_default();
            let written_to = match output {
                Some(out) if !data.is_empty() => {
                    std::fs::write(out, &data)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    Some(out)
                }
                _ => None,
            };
            ArtOutput {
                path,
                code,
                found: !data.is_empty(),
                bytes: data.len(),
                mime_type: cover::guess_mime_type(&data),
                written_to,
                error: None,
            }
        }
        Err(e) => ArtOutput {
            path,
            code,
            found: false,
            bytes: 0,
            mime_type: None,
            written_to: None,
            error: Some(e.to_string()),
        },
    };
    print_json(&summary)?;
    Ok(code)
}

/// Replace the front cover with `image`, or remove it
pub fn cmd_set_art(
    path: &Path,
    image: Option<&Path>,
    mime: Option<String>,
    config: &WriteConfig,
) -> anyhow::Result<ErrorCode> {
    let request = match image {
        Some(image) => CoverRequest {
            mime_type: mime,
            ..CoverRequest::from_file(image)
        },
        None => CoverRequest::delete(),
    };
    let result = cover::save_embedded_art(path, &request, config);
    report(path, &result)
}
