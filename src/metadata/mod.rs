//! Audio file metadata reading and writing.
//!
//! Uses the lofty crate for container parsing and native tag access.
//! Each tag family maps onto [`SongMetadata`] through its [`TagAdapter`].
//!
//! # Features
//! - Read identity, audio properties and tags into one canonical record
//! - Write selected field groups back ([`SaveFields`])
//! - Play count and rating updates without touching other fields
//! - ID3v2, Vorbis comments, APE, MP4 and ASF tag families

pub mod adapter;
pub mod ape;
pub mod asf;
pub mod detect;
pub mod id3v2;
pub mod mp4;
pub mod rating;
pub mod xiph;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

pub use adapter::TagAdapter;
pub use detect::{AudioProperties, TagFamily, TaggedAudio};

use crate::config::WriteConfig;
use crate::cover::{self, CoverRequest};
use crate::error::{Result, TagError, require_existing, require_filename};
use crate::model::{ABSENT, SaveFields, SongMetadata};
use adapter::{PendingFields, fill_missing, join_pending, read_common, write_common};

// ============================================================================
// Reading
// ============================================================================

/// Fill `song` from the file at `path`.
///
/// A missing file leaves `song` untouched. Once the file has been stat'ed
/// the identity fields are set, even when the format then turns out to be
/// unsupported; callers should discard the record on any error.
pub fn read_file(path: &Path, song: &mut SongMetadata) -> Result<()> {
    require_filename(path)?;
    let stat = require_existing(path)?;
    fill_identity(path, &stat, song);

    let audio = TaggedAudio::open(path).inspect_err(|e| {
        debug!(target: "metadata::read", path = %path.display(), error = %e, "Could not open file");
    })?;

    song.filetype = audio.file_type();
    fill_properties(&audio.properties(), song);
    song.valid = true;

    let mut pending = PendingFields::default();
    if let Some(tag) = audio.tag() {
        read_common(tag, song);
        tag.read_into(&mut pending, song);
    }
    for tag in audio.fallback_tags() {
        fill_missing(tag, song);
    }
    if audio.has_flac_front_cover() {
        song.art_embedded = true;
    }
    join_pending(&pending, song);
    song.normalize_numbers();

    debug!(
        target: "metadata::read",
        path = %path.display(),
        filetype = song.filetype.name(),
        title = %song.title,
        "Read tags"
    );
    Ok(())
}

/// Read a file into a fresh record.
pub fn read(path: &Path) -> Result<SongMetadata> {
    let mut song = SongMetadata::default();
    read_file(path, &mut song)?;
    Ok(song)
}

/// Whether the file opens as a supported audio container.
pub fn is_media_file(path: &Path) -> bool {
    TaggedAudio::open(path).is_ok()
}

fn fill_identity(path: &Path, stat: &fs::Metadata, song: &mut SongMetadata) {
    song.basefilename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    song.url = file_url(path);
    song.filesize = i64::try_from(stat.len()).unwrap_or(i64::MAX);
    song.mtime = stat.modified().map(unix_seconds).unwrap_or(0);
    song.ctime = stat.created().map(unix_seconds).unwrap_or(0);
    if song.ctime <= 0 {
        song.ctime = song.mtime;
    }
    song.lastseen = Utc::now().timestamp();
}

fn fill_properties(props: &AudioProperties, song: &mut SongMetadata) {
    let to_i32 = |value: Option<u32>| value.and_then(|v| i32::try_from(v).ok()).unwrap_or(ABSENT);

    song.bitrate = to_i32(props.audio_bitrate.or(props.overall_bitrate));
    song.samplerate = to_i32(props.sample_rate);
    song.bitdepth = props.bit_depth.map_or(ABSENT, i32::from);
    song.length_nanosec = i64::try_from(props.duration.as_nanos()).unwrap_or(i64::MAX);
}

fn unix_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

/// `file://` URL of the absolute path, each segment percent-encoded.
pub fn file_url(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut url = String::from("file://");
    for component in absolute.components() {
        if let Component::Normal(segment) = component {
            url.push('/');
            url.push_str(&urlencoding::encode(&segment.to_string_lossy()));
        }
    }
    if url.len() == "file://".len() {
        url.push('/');
    }
    url
}

// ============================================================================
// Writing
// ============================================================================

/// Write the selected field groups of `song` to the file.
///
/// With [`SaveFields::COVER`] the front cover is replaced by `cover`, or
/// removed when `cover` is `None` or empty. Formats without an embedded
/// cover skip that step.
pub fn write_file(
    path: &Path,
    song: &SongMetadata,
    fields: SaveFields,
    cover: Option<&CoverRequest>,
    config: &WriteConfig,
) -> Result<()> {
    require_filename(path)?;
    require_existing(path)?;

    let front = if fields.contains(SaveFields::COVER) {
        Some(cover.map(CoverRequest::load).transpose()?.unwrap_or_default())
    } else {
        None
    };

    let mut audio = TaggedAudio::open(path)?;
    let tag = primary_tag(&mut audio, path)?;
    if fields.contains(SaveFields::TAGS) {
        write_common(tag, song);
        tag.write_tags(song);
    }
    if fields.contains(SaveFields::PLAYCOUNT) {
        tag.write_playcount(song.playcount);
    }
    if fields.contains(SaveFields::RATING) {
        tag.write_rating(song.rating);
    }
    if let Some(front) = &front
        && !cover::embed(&mut audio, front, path)?
    {
        debug!(
            target: "metadata::write",
            path = %path.display(),
            filetype = audio.file_type().name(),
            "Format has no embedded cover, skipping"
        );
    }

    save(&audio, path, config)?;
    info!(
        target: "metadata::write",
        path = %path.display(),
        fields = ?fields,
        "Wrote tags"
    );
    Ok(())
}

/// Store only the play count. Zero removes it.
pub fn save_song_playcount_to_file(path: &Path, playcount: u32, config: &WriteConfig) -> Result<()> {
    require_filename(path)?;
    require_existing(path)?;

    update_tag(path, config, |tag| tag.write_playcount(playcount))?;
    debug!(target: "metadata::write", path = %path.display(), playcount, "Saved play count");
    Ok(())
}

/// Store only the rating. Zero removes it; a negative rating is ignored.
pub fn save_song_rating_to_file(path: &Path, rating: f32, config: &WriteConfig) -> Result<()> {
    require_filename(path)?;
    require_existing(path)?;

    if rating < 0.0 {
        debug!(target: "metadata::write", path = %path.display(), rating, "Negative rating, nothing to save");
        return Ok(());
    }
    update_tag(path, config, |tag| tag.write_rating(rating))?;
    debug!(target: "metadata::write", path = %path.display(), rating, "Saved rating");
    Ok(())
}

fn update_tag(
    path: &Path,
    config: &WriteConfig,
    update: impl FnOnce(&mut dyn TagAdapter),
) -> Result<()> {
    let mut audio = TaggedAudio::open(path)?;
    update(primary_tag(&mut audio, path)?);
    save(&audio, path, config)
}

fn primary_tag<'a>(audio: &'a mut TaggedAudio, path: &Path) -> Result<&'a mut dyn TagAdapter> {
    let filetype = audio.file_type();
    audio
        .tag_or_insert()
        .ok_or_else(|| TagError::unsupported(path, format!("no writable tag for {}", filetype.name())))
}

/// Save the file, then bump its timestamps when configured.
pub(crate) fn save(audio: &TaggedAudio, path: &Path, config: &WriteConfig) -> Result<()> {
    audio.save(path, config.write_options())?;
    if config.touch_after_save {
        touch(path);
    }
    Ok(())
}

/// Sibling path a rewritten file is staged at before it replaces the original.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tagbridge.tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` through a staged sibling and a rename.
///
/// The original is left untouched when any step fails.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // A file that cannot be written in place is not replaced either
    fs::File::options().write(true).open(path)?;

    let staged = staging_path(path);
    let written = fs::write(&staged, bytes)
        .and_then(|()| fs::set_permissions(&staged, fs::metadata(path)?.permissions()))
        .and_then(|()| fs::rename(&staged, path));
    if written.is_err() {
        // Best effort; the staged file may not exist
        let _ = fs::remove_file(&staged);
    }
    written
}

#[cfg(target_os = "linux")]
fn touch(path: &Path) {
    let now = SystemTime::now();
    let times = fs::FileTimes::new().set_accessed(now).set_modified(now);
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_times(times));
    if let Err(e) = result {
        warn!(target: "metadata::write", path = %path.display(), error = %e, "Could not update file times");
    }
}

#[cfg(not(target_os = "linux"))]
fn touch(_path: &Path) {}
