//! Embedded cover art.
//!
//! Reading returns the raw bytes of the first front cover found in the
//! file's native tags. Writing always clears existing front covers first
//! and inserts the new image only when it has data, so an empty
//! [`Cover`] removes the art.
//!
//! Cover images arrive as a [`CoverRequest`]: raw bytes, or a path to an
//! image file, with an optional MIME type that is sniffed from the bytes
//! when missing.

pub mod embedded;

use lofty::id3::v2::Id3v2Tag;
use lofty::mp4::Ilst;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::WriteConfig;
use crate::error::{Result, TagError, require_existing, require_filename};
use crate::metadata::{self, TaggedAudio};

/// Image bytes ready to embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cover {
    pub data: Vec<u8>,
    /// image/jpeg, image/png, ...
    pub mime_type: String,
}

impl Cover {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Where a new cover comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverRequest {
    /// Image bytes; takes precedence over `filename`
    pub data: Vec<u8>,
    /// Image file to read when `data` is empty
    pub filename: Option<PathBuf>,
    /// Sniffed from the bytes when absent
    pub mime_type: Option<String>,
}

impl CoverRequest {
    /// A request that removes the embedded cover.
    pub fn delete() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime_type: Option<String>) -> Self {
        Self {
            data,
            filename: None,
            mime_type,
        }
    }

    /// Resolve the request into image bytes and a MIME type.
    pub fn load(&self) -> Result<Cover> {
        let mut data = self.data.clone();
        let mut mime_type = self.mime_type.clone().filter(|m| !m.is_empty());

        if data.is_empty()
            && let Some(filename) = &self.filename
        {
            debug!(target: "cover::load", path = %filename.display(), "Loading cover from file");
            data = std::fs::read(filename).map_err(|e| TagError::open(filename, e))?;
            if mime_type.is_none() {
                mime_type = guess_mime_type(&data);
            }
        }

        if data.is_empty() {
            return Ok(Cover::default());
        }
        let mime_type = mime_type
            .or_else(|| guess_mime_type(&data))
            .unwrap_or_else(|| "image/jpeg".to_string());
        Ok(Cover { data, mime_type })
    }
}

/// MIME type from the image's magic bytes.
pub fn guess_mime_type(data: &[u8]) -> Option<String> {
    image::guess_format(data)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

// ============================================================================
// Operations
// ============================================================================

/// Read the embedded front cover. `Ok(None)` when there is none.
pub fn load_embedded_art(path: &Path) -> Result<Option<Vec<u8>>> {
    require_filename(path)?;
    require_existing(path)?;

    let audio = TaggedAudio::open(path)?;
    let art = extract(&audio);
    debug!(
        target: "cover::load",
        path = %path.display(),
        found = art.is_some(),
        "Loaded embedded art"
    );
    Ok(art)
}

/// Replace the embedded front cover. `Unsupported` for formats without one.
pub fn save_embedded_art(path: &Path, request: &CoverRequest, config: &WriteConfig) -> Result<()> {
    require_filename(path)?;
    require_existing(path)?;

    let cover = request.load()?;
    let mut audio = TaggedAudio::open(path)?;
    if !embed(&mut audio, &cover, path)? {
        return Err(TagError::unsupported(
            path,
            format!("{} files have no embedded cover", audio.file_type().name()),
        ));
    }
    metadata::save(&audio, path, config)?;

    info!(
        target: "cover::save",
        path = %path.display(),
        bytes = cover.data.len(),
        "Saved embedded art"
    );
    Ok(())
}

fn extract(audio: &TaggedAudio) -> Option<Vec<u8>> {
    match audio {
        TaggedAudio::Flac(f) => embedded::flac_cover(f),
        TaggedAudio::Vorbis(f) => embedded::xiph_cover(f.vorbis_comments()),
        TaggedAudio::Opus(f) => embedded::xiph_cover(f.vorbis_comments()),
        TaggedAudio::Speex(f) => embedded::xiph_cover(f.vorbis_comments()),
        TaggedAudio::Mpeg(f) => f.id3v2().and_then(embedded::id3v2_cover),
        TaggedAudio::Aac(f) => f.id3v2().and_then(embedded::id3v2_cover),
        TaggedAudio::Wav(f) => f.id3v2().and_then(embedded::id3v2_cover),
        TaggedAudio::Aiff(f) => f.id3v2().and_then(embedded::id3v2_cover),
        TaggedAudio::Ape(f) => f.ape().and_then(embedded::ape_cover),
        TaggedAudio::WavPack(f) => f.ape().and_then(embedded::ape_cover),
        TaggedAudio::Mpc(f) => f.ape().and_then(embedded::ape_cover),
        TaggedAudio::Mp4(f) => f.ilst().and_then(embedded::mp4_cover),
        TaggedAudio::Asf(f) => embedded::asf_cover(f.tag()),
    }
}

macro_rules! id3v2_or_insert {
    ($file:expr) => {{
        if $file.id3v2().is_none() {
            $file.set_id3v2(Id3v2Tag::default());
        }
        $file.id3v2_mut()
    }};
}

/// Put `cover` into the file's tags. Returns `false` when the format has
/// nowhere to put it.
pub(crate) fn embed(audio: &mut TaggedAudio, cover: &Cover, path: &Path) -> Result<bool> {
    let result = match audio {
        TaggedAudio::Flac(f) => embedded::replace_flac(f, cover),
        TaggedAudio::Vorbis(f) => embedded::replace_xiph(f.vorbis_comments_mut(), cover),
        TaggedAudio::Opus(f) => embedded::replace_xiph(f.vorbis_comments_mut(), cover),
        TaggedAudio::Speex(f) => embedded::replace_xiph(f.vorbis_comments_mut(), cover),
        TaggedAudio::Mpeg(f) => {
            if let Some(tag) = id3v2_or_insert!(f) {
                embedded::replace_id3v2(tag, cover);
            }
            Ok(())
        }
        TaggedAudio::Aac(f) => {
            if let Some(tag) = id3v2_or_insert!(f) {
                embedded::replace_id3v2(tag, cover);
            }
            Ok(())
        }
        TaggedAudio::Wav(f) => {
            if let Some(tag) = id3v2_or_insert!(f) {
                embedded::replace_id3v2(tag, cover);
            }
            Ok(())
        }
        TaggedAudio::Aiff(f) => {
            if let Some(tag) = id3v2_or_insert!(f) {
                embedded::replace_id3v2(tag, cover);
            }
            Ok(())
        }
        TaggedAudio::Mp4(f) => {
            if f.ilst().is_none() {
                f.set_ilst(Ilst::default());
            }
            if let Some(tag) = f.ilst_mut() {
                embedded::replace_mp4(tag, cover);
            }
            Ok(())
        }
        TaggedAudio::Asf(f) => {
            embedded::replace_asf(f.tag_mut(), cover).map_err(|e| TagError::save(path, e))?;
            Ok(())
        }
        TaggedAudio::Ape(_) | TaggedAudio::WavPack(_) | TaggedAudio::Mpc(_) => return Ok(false),
    };
    result.map_err(|e| TagError::save(path, e))?;
    Ok(true)
}
