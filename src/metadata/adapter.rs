//! The seam between the canonical record and each tag format.
//!
//! Every tag family implements [`TagAdapter`] on its native tag type. The
//! generic fields (title, artist, album, genre, comment, year, track) go
//! through lofty's [`Accessor`], which every adapter also implements.

use lofty::tag::Accessor;

use crate::model::SongMetadata;

/// Raw values whose interpretation is deferred until every tag was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFields {
    /// "N" or "N/total"
    pub disc: Option<String>,
    /// Usually "1" or "0"; absent triggers inference from the artist
    pub compilation: Option<String>,
}

/// Maps one tag format onto [`SongMetadata`] and back.
pub trait TagAdapter: Accessor {
    /// Copy the format-specific fields into the record.
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata);

    /// Write the extended fields (everything beyond the generic set).
    fn write_tags(&mut self, song: &SongMetadata);

    /// Zero removes the play count.
    fn write_playcount(&mut self, playcount: u32);

    /// Zero or below removes the rating.
    fn write_rating(&mut self, rating: f32);
}

/// Copy the generic fields every tag format shares.
pub fn read_common(tag: &dyn TagAdapter, song: &mut SongMetadata) {
    if let Some(title) = tag.title() {
        song.title = title.into_owned();
    }
    if let Some(artist) = tag.artist() {
        song.artist = artist.into_owned();
    }
    if let Some(album) = tag.album() {
        song.album = album.into_owned();
    }
    if let Some(genre) = tag.genre() {
        song.genre = genre.into_owned();
    }
    if let Some(comment) = tag.comment() {
        song.comment = comment.into_owned();
    }
    if let Some(year) = tag.year() {
        song.year = i32::try_from(year).unwrap_or(0);
    }
    if let Some(track) = tag.track() {
        song.track = i32::try_from(track).unwrap_or(0);
    }
}

/// Fill the generic fields the primary tag left empty from a secondary tag
/// (ID3v1, APE or RIFF INFO riding along in the same file).
pub fn fill_missing(tag: &dyn Accessor, song: &mut SongMetadata) {
    fill_text(&mut song.title, tag.title());
    fill_text(&mut song.artist, tag.artist());
    fill_text(&mut song.album, tag.album());
    fill_text(&mut song.genre, tag.genre());
    fill_text(&mut song.comment, tag.comment());
    if song.year <= 0
        && let Some(year) = tag.year().and_then(|y| i32::try_from(y).ok())
    {
        song.year = year;
    }
    if song.track <= 0
        && let Some(track) = tag.track().and_then(|t| i32::try_from(t).ok())
    {
        song.track = track;
    }
}

fn fill_text(field: &mut String, value: Option<std::borrow::Cow<'_, str>>) {
    if field.is_empty()
        && let Some(value) = value.filter(|v| !v.is_empty())
    {
        *field = value.into_owned();
    }
}

/// Write the generic fields. Empty strings and absent numbers clear them.
pub fn write_common(tag: &mut dyn TagAdapter, song: &SongMetadata) {
    set_or_remove(tag, &song.title, |t, v| t.set_title(v), |t| t.remove_title());
    set_or_remove(tag, &song.artist, |t, v| t.set_artist(v), |t| t.remove_artist());
    set_or_remove(tag, &song.album, |t, v| t.set_album(v), |t| t.remove_album());
    set_or_remove(tag, &song.genre, |t, v| t.set_genre(v), |t| t.remove_genre());
    set_or_remove(tag, &song.comment, |t, v| t.set_comment(v), |t| t.remove_comment());

    match SongMetadata::positive(song.year) {
        Some(year) => tag.set_year(year),
        None => tag.remove_year(),
    }
    match SongMetadata::positive(song.track) {
        Some(track) => tag.set_track(track),
        None => tag.remove_track(),
    }
}

fn set_or_remove(
    tag: &mut dyn TagAdapter,
    value: &str,
    set: impl FnOnce(&mut dyn TagAdapter, String),
    remove: impl FnOnce(&mut dyn TagAdapter),
) {
    if value.is_empty() {
        remove(tag);
    } else {
        set(tag, value.to_string());
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// AcoustID and MusicBrainz identifiers carried as opaque strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identifier {
    AcoustidId,
    AcoustidFingerprint,
    AlbumArtistId,
    ArtistId,
    OriginalArtistId,
    AlbumId,
    OriginalAlbumId,
    RecordingId,
    TrackId,
    DiscId,
    ReleaseGroupId,
    WorkId,
}

impl Identifier {
    /// The record field holding this identifier.
    pub fn field_mut(self, song: &mut SongMetadata) -> &mut String {
        match self {
            Self::AcoustidId => &mut song.acoustid_id,
            Self::AcoustidFingerprint => &mut song.acoustid_fingerprint,
            Self::AlbumArtistId => &mut song.musicbrainz_album_artist_id,
            Self::ArtistId => &mut song.musicbrainz_artist_id,
            Self::OriginalArtistId => &mut song.musicbrainz_original_artist_id,
            Self::AlbumId => &mut song.musicbrainz_album_id,
            Self::OriginalAlbumId => &mut song.musicbrainz_original_album_id,
            Self::RecordingId => &mut song.musicbrainz_recording_id,
            Self::TrackId => &mut song.musicbrainz_track_id,
            Self::DiscId => &mut song.musicbrainz_disc_id,
            Self::ReleaseGroupId => &mut song.musicbrainz_release_group_id,
            Self::WorkId => &mut song.musicbrainz_work_id,
        }
    }
}

/// Identifier keys shared by Vorbis comments and APE items.
pub const UPPERCASE_ID_KEYS: &[(Identifier, &str)] = &[
    (Identifier::AcoustidId, "ACOUSTID_ID"),
    (Identifier::AcoustidFingerprint, "ACOUSTID_FINGERPRINT"),
    (Identifier::AlbumArtistId, "MUSICBRAINZ_ALBUMARTISTID"),
    (Identifier::ArtistId, "MUSICBRAINZ_ARTISTID"),
    (Identifier::OriginalArtistId, "MUSICBRAINZ_ORIGINALARTISTID"),
    (Identifier::AlbumId, "MUSICBRAINZ_ALBUMID"),
    (Identifier::OriginalAlbumId, "MUSICBRAINZ_ORIGINALALBUMID"),
    (Identifier::RecordingId, "MUSICBRAINZ_TRACKID"),
    (Identifier::TrackId, "MUSICBRAINZ_RELEASETRACKID"),
    (Identifier::DiscId, "MUSICBRAINZ_DISCID"),
    (Identifier::ReleaseGroupId, "MUSICBRAINZ_RELEASEGROUPID"),
    (Identifier::WorkId, "MUSICBRAINZ_WORKID"),
];

/// Fill identifiers from a key lookup. Empty values are skipped.
pub fn read_identifiers<'a>(
    keys: &[(Identifier, &str)],
    song: &mut SongMetadata,
    mut lookup: impl FnMut(&str) -> Option<std::borrow::Cow<'a, str>>,
) {
    for (id, key) in keys {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
            *id.field_mut(song) = value.trim().to_string();
        }
    }
}

// ============================================================================
// Deferred fields
// ============================================================================

/// Resolve disc and compilation once every tag has been read.
pub fn join_pending(pending: &PendingFields, song: &mut SongMetadata) {
    if let Some(disc) = pending.disc.as_deref() {
        song.disc = parse_disc(disc);
    }

    song.compilation = match pending.compilation.as_deref().map(str::trim) {
        None | Some("") => {
            is_various_artists(&song.artist) || is_various_artists(&song.albumartist)
        }
        Some(value) => value.parse::<i32>().ok() == Some(1),
    };
}

/// Disc number from "N" or "N/total". Unparseable text yields 0.
pub fn parse_disc(text: &str) -> i32 {
    let number = text.split('/').next().unwrap_or_default();
    number.trim().parse().unwrap_or(0)
}

fn is_various_artists(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("various artists")
}

// ============================================================================
// Text helpers shared by the adapters
// ============================================================================

/// Year from the first four characters of a date ("2001-05-01" -> 2001).
pub fn year_prefix(text: &str) -> i32 {
    let prefix: String = text.trim().chars().take(4).collect();
    prefix.parse().unwrap_or(0)
}

/// Leading decimal integer, ignoring anything after it ("3/12" -> 3).
pub fn leading_int(text: &str) -> i32 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().unwrap_or(0)
}

/// Text for a "1"/empty boolean field.
pub fn flag_text(value: bool) -> String {
    if value { "1".to_string() } else { String::new() }
}

/// Disc text for writing, empty when absent.
pub fn disc_text(disc: i32) -> String {
    SongMetadata::positive(disc).map_or_else(String::new, |d| d.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ABSENT;

    #[test]
    fn test_parse_disc() {
        assert_eq!(parse_disc("3/12"), 3);
        assert_eq!(parse_disc("2"), 2);
        assert_eq!(parse_disc(" 4 / 5"), 4);
        assert_eq!(parse_disc("/5"), 0);
        assert_eq!(parse_disc("one"), 0);
    }

    #[test]
    fn test_fill_missing_keeps_primary_values() {
        let mut v1 = lofty::id3::v1::Id3v1Tag::new();
        v1.set_title("Secondary".to_string());
        v1.set_artist("Artist".to_string());
        v1.set_year(1999);

        let mut song = SongMetadata {
            title: "Primary".to_string(),
            ..Default::default()
        };
        fill_missing(&v1, &mut song);

        assert_eq!(song.title, "Primary");
        assert_eq!(song.artist, "Artist");
        assert_eq!(song.year, 1999);
        assert_eq!(song.album, "");
    }

    #[test]
    fn test_join_disc() {
        let pending = PendingFields {
            disc: Some("3/12".to_string()),
            compilation: None,
        };
        let mut song = SongMetadata::default();
        join_pending(&pending, &mut song);
        assert_eq!(song.disc, 3);
    }

    #[test]
    fn test_join_leaves_missing_disc_absent() {
        let mut song = SongMetadata::default();
        join_pending(&PendingFields::default(), &mut song);
        assert_eq!(song.disc, ABSENT);
    }

    #[test]
    fn test_compilation_inferred_from_various_artists() {
        let mut song = SongMetadata {
            artist: "Various Artists".to_string(),
            ..Default::default()
        };
        join_pending(&PendingFields::default(), &mut song);
        assert!(song.compilation);

        let mut song = SongMetadata {
            albumartist: "various artists".to_string(),
            ..Default::default()
        };
        join_pending(&PendingFields::default(), &mut song);
        assert!(song.compilation);
    }

    #[test]
    fn test_compilation_explicit_value_wins() {
        let pending = PendingFields {
            disc: None,
            compilation: Some("0".to_string()),
        };
        let mut song = SongMetadata {
            artist: "Various Artists".to_string(),
            ..Default::default()
        };
        join_pending(&pending, &mut song);
        assert!(!song.compilation);

        let pending = PendingFields {
            disc: None,
            compilation: Some("1".to_string()),
        };
        join_pending(&pending, &mut song);
        assert!(song.compilation);
    }

    #[test]
    fn test_year_prefix() {
        assert_eq!(year_prefix("2001-05-01"), 2001);
        assert_eq!(year_prefix("1987"), 1987);
        assert_eq!(year_prefix("n/a"), 0);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("3/12"), 3);
        assert_eq!(leading_int("1"), 1);
        assert_eq!(leading_int(""), 0);
        assert_eq!(leading_int("x1"), 0);
    }

    #[test]
    fn test_write_texts() {
        assert_eq!(flag_text(true), "1");
        assert_eq!(flag_text(false), "");
        assert_eq!(disc_text(-1), "");
        assert_eq!(disc_text(0), "");
        assert_eq!(disc_text(2), "2");
    }
}
