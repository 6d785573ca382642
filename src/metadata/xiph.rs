//! Vorbis comment mapping (FLAC, Ogg Vorbis, Opus, Speex).
//!
//! Keys are case-insensitive. Several fields have a legacy spelling that is
//! only read when the modern key is missing, and removed on write.

use lofty::ogg::{OggPictureStorage, VorbisComments};
use std::borrow::Cow;

use super::adapter::{
    PendingFields, TagAdapter, UPPERCASE_ID_KEYS, disc_text, flag_text, read_identifiers,
    year_prefix,
};
use super::rating::{format_rating, merge_playcount, merge_rating, parse_playcount, parse_rating};
use crate::model::SongMetadata;

const COMPOSER: &str = "COMPOSER";
const PERFORMER: &str = "PERFORMER";
const GROUPING: &str = "GROUPING";
const GROUPING_LEGACY: &str = "CONTENT GROUP";
const ALBUM_ARTIST: &str = "ALBUMARTIST";
const ALBUM_ARTIST_LEGACY: &str = "ALBUM ARTIST";
const ORIGINAL_DATE: &str = "ORIGINALDATE";
const ORIGINAL_YEAR_LEGACY: &str = "ORIGINALYEAR";
const DISC: &str = "DISCNUMBER";
const COMPILATION: &str = "COMPILATION";
const LYRICS: &str = "LYRICS";
const LYRICS_LEGACY: &str = "UNSYNCEDLYRICS";
const FMPS_PLAYCOUNT: &str = "FMPS_PLAYCOUNT";
const FMPS_RATING: &str = "FMPS_RATING";
pub(crate) const COVER_ART_LEGACY: &str = "COVERART";
pub(crate) const COVER_ART_MIME_LEGACY: &str = "COVERARTMIME";

fn field<'a>(tag: &'a VorbisComments, key: &str) -> Option<&'a str> {
    tag.get(key).filter(|v| !v.trim().is_empty())
}

/// Modern key first, legacy only when the modern one is missing.
fn field_or_legacy<'a>(tag: &'a VorbisComments, modern: &str, legacy: &str) -> Option<&'a str> {
    field(tag, modern).or_else(|| field(tag, legacy))
}

fn set_field(tag: &mut VorbisComments, key: &str, value: &str) {
    if value.is_empty() {
        tag.remove(key).for_each(drop);
    } else {
        tag.insert(key.to_string(), value.to_string());
    }
}

/// Write the modern key and drop the legacy spelling.
fn set_modern(tag: &mut VorbisComments, modern: &str, legacy: &str, value: &str) {
    tag.remove(legacy).for_each(drop);
    set_field(tag, modern, value);
}

impl TagAdapter for VorbisComments {
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata) {
        if let Some(composer) = field(self, COMPOSER) {
            song.composer = composer.to_string();
        }
        if let Some(performer) = field(self, PERFORMER) {
            song.performer = performer.to_string();
        }
        if let Some(grouping) = field_or_legacy(self, GROUPING, GROUPING_LEGACY) {
            song.grouping = grouping.to_string();
        }
        if let Some(albumartist) = field_or_legacy(self, ALBUM_ARTIST, ALBUM_ARTIST_LEGACY) {
            song.albumartist = albumartist.to_string();
        }
        if let Some(date) = field_or_legacy(self, ORIGINAL_DATE, ORIGINAL_YEAR_LEGACY) {
            song.originalyear = year_prefix(date);
        }
        if let Some(disc) = field(self, DISC) {
            pending.disc = Some(disc.trim().to_string());
        }
        if let Some(compilation) = field(self, COMPILATION) {
            pending.compilation = Some(compilation.trim().to_string());
        }
        if let Some(lyrics) = field_or_legacy(self, LYRICS, LYRICS_LEGACY) {
            song.lyrics = lyrics.to_string();
        }

        if self.pictures().iter().any(|(p, _)| !p.data().is_empty())
            || field(self, COVER_ART_LEGACY).is_some()
        {
            song.art_embedded = true;
        }

        if let Some(playcount) = field(self, FMPS_PLAYCOUNT) {
            merge_playcount(song, parse_playcount(playcount));
        }
        if let Some(rating) = field(self, FMPS_RATING) {
            merge_rating(song, parse_rating(rating));
        }

        read_identifiers(UPPERCASE_ID_KEYS, song, |key| {
            field(self, key).map(Cow::Borrowed)
        });
    }

    fn write_tags(&mut self, song: &SongMetadata) {
        set_field(self, COMPOSER, &song.composer);
        set_field(self, PERFORMER, &song.performer);
        set_modern(self, GROUPING, GROUPING_LEGACY, &song.grouping);
        set_field(self, DISC, &disc_text(song.disc));
        set_field(self, COMPILATION, &flag_text(song.compilation));
        set_modern(self, ALBUM_ARTIST, ALBUM_ARTIST_LEGACY, &song.albumartist);
        set_modern(self, LYRICS, LYRICS_LEGACY, &song.lyrics);

        // A full date already matching the year is kept as is.
        let current = field_or_legacy(self, ORIGINAL_DATE, ORIGINAL_YEAR_LEGACY).map(year_prefix);
        if current != Some(song.originalyear) {
            let year = SongMetadata::positive(song.originalyear)
                .map_or_else(String::new, |y| y.to_string());
            set_modern(self, ORIGINAL_DATE, ORIGINAL_YEAR_LEGACY, &year);
        }
    }

    fn write_playcount(&mut self, playcount: u32) {
        let value = if playcount > 0 { playcount.to_string() } else { String::new() };
        set_field(self, FMPS_PLAYCOUNT, &value);
    }

    fn write_rating(&mut self, rating: f32) {
        let value = if rating > 0.0 { format_rating(rating) } else { String::new() };
        set_field(self, FMPS_RATING, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::adapter::join_pending;
    use crate::model::ABSENT;

    fn read(tag: &VorbisComments) -> SongMetadata {
        let mut song = SongMetadata::default();
        let mut pending = PendingFields::default();
        tag.read_into(&mut pending, &mut song);
        join_pending(&pending, &mut song);
        song.normalize_numbers();
        song
    }

    #[test]
    fn test_modern_album_artist_wins() {
        let mut tag = VorbisComments::default();
        tag.insert("ALBUM ARTIST".to_string(), "X".to_string());
        tag.insert("ALBUMARTIST".to_string(), "Y".to_string());

        assert_eq!(read(&tag).albumartist, "Y");
    }

    #[test]
    fn test_legacy_keys_used_as_fallback() {
        let mut tag = VorbisComments::default();
        tag.insert("ALBUM ARTIST".to_string(), "Old Spelling".to_string());
        tag.insert("UNSYNCEDLYRICS".to_string(), "words".to_string());
        tag.insert("CONTENT GROUP".to_string(), "Group".to_string());
        tag.insert("ORIGINALYEAR".to_string(), "1971".to_string());

        let song = read(&tag);
        assert_eq!(song.albumartist, "Old Spelling");
        assert_eq!(song.lyrics, "words");
        assert_eq!(song.grouping, "Group");
        assert_eq!(song.originalyear, 1971);
    }

    #[test]
    fn test_write_removes_legacy_keys() {
        let mut tag = VorbisComments::default();
        tag.insert("ALBUM ARTIST".to_string(), "Old".to_string());
        tag.insert("UNSYNCEDLYRICS".to_string(), "old words".to_string());

        let song = SongMetadata {
            albumartist: "New".to_string(),
            lyrics: "new words".to_string(),
            ..Default::default()
        };
        tag.write_tags(&song);

        assert_eq!(tag.get("ALBUMARTIST"), Some("New"));
        assert_eq!(tag.get("ALBUM ARTIST"), None);
        assert_eq!(tag.get("LYRICS"), Some("new words"));
        assert_eq!(tag.get("UNSYNCEDLYRICS"), None);
    }

    #[test]
    fn test_write_keeps_matching_original_date() {
        let mut tag = VorbisComments::default();
        tag.insert("ORIGINALDATE".to_string(), "1971-11-08".to_string());

        let song = SongMetadata {
            originalyear: 1971,
            ..Default::default()
        };
        tag.write_tags(&song);
        assert_eq!(tag.get("ORIGINALDATE"), Some("1971-11-08"));

        let song = SongMetadata {
            originalyear: 1980,
            ..Default::default()
        };
        tag.write_tags(&song);
        assert_eq!(tag.get("ORIGINALDATE"), Some("1980"));
    }

    #[test]
    fn test_extended_roundtrip() {
        let song = SongMetadata {
            composer: "Composer".to_string(),
            performer: "Performer".to_string(),
            grouping: "Grouping".to_string(),
            disc: 3,
            compilation: true,
            ..Default::default()
        };
        let mut tag = VorbisComments::default();
        tag.write_tags(&song);

        let read = read(&tag);
        assert_eq!(read.composer, "Composer");
        assert_eq!(read.performer, "Performer");
        assert_eq!(read.grouping, "Grouping");
        assert_eq!(read.disc, 3);
        assert!(read.compilation);
    }

    #[test]
    fn test_absent_disc_writes_nothing() {
        let mut tag = VorbisComments::default();
        tag.insert("DISCNUMBER".to_string(), "2".to_string());
        tag.write_tags(&SongMetadata::default());

        assert_eq!(tag.get("DISCNUMBER"), None);
        assert_eq!(read(&tag).disc, ABSENT);
    }

    #[test]
    fn test_playcount_and_rating() {
        let mut tag = VorbisComments::default();
        tag.write_playcount(9);
        tag.write_rating(0.6);
        assert_eq!(tag.get("FMPS_PLAYCOUNT"), Some("9"));
        assert_eq!(tag.get("FMPS_RATING"), Some("0.6"));

        let song = read(&tag);
        assert_eq!(song.playcount, 9);
        assert_eq!(song.rating, 0.6);

        tag.write_playcount(0);
        tag.write_rating(-1.0);
        assert_eq!(tag.get("FMPS_PLAYCOUNT"), None);
        assert_eq!(tag.get("FMPS_RATING"), None);
    }

    #[test]
    fn test_identifiers() {
        let mut tag = VorbisComments::default();
        tag.insert("MUSICBRAINZ_TRACKID".to_string(), "rec-1".to_string());
        tag.insert("MUSICBRAINZ_RELEASETRACKID".to_string(), "trk-1".to_string());
        tag.insert("ACOUSTID_FINGERPRINT".to_string(), "AQAAfp".to_string());

        let song = read(&tag);
        assert_eq!(song.musicbrainz_recording_id, "rec-1");
        assert_eq!(song.musicbrainz_track_id, "trk-1");
        assert_eq!(song.acoustid_fingerprint, "AQAAfp");
    }
}
