//! ID3v2 mapping (MP3, WAV, AIFF, raw AAC).
//!
//! Frames are keyed by four-character ids. Extended identifiers live in
//! TXXX frames keyed by description, except the recording id which lives
//! in a UFID frame owned by MusicBrainz.

use lofty::TextEncoding;
use lofty::id3::v2::{
    Frame, FrameFlags, FrameId, Id3v2Tag, PopularimeterFrame, SynchronizedTextFrame,
    TextInformationFrame, UnsynchronizedTextFrame,
};
use std::borrow::Cow;

use super::adapter::{
    Identifier, PendingFields, TagAdapter, disc_text, flag_text, read_identifiers, year_prefix,
};
use super::rating::{
    format_rating, merge_playcount, merge_rating, parse_playcount, parse_rating, popm_to_rating,
    rating_to_popm,
};
use crate::model::SongMetadata;

const MUSICBRAINZ_UFID_OWNER: &str = "http://musicbrainz.org";
const ITUNES_NORMALIZATION: &str = "iTunNORM";
const FMPS_PLAYCOUNT: &str = "FMPS_Playcount";
const FMPS_RATING: &str = "FMPS_Rating";
const UNKNOWN_LANGUAGE: [u8; 3] = *b"XXX";

/// TXXX descriptions for identifiers. The recording id comes from UFID.
const USER_TEXT_IDS: &[(Identifier, &str)] = &[
    (Identifier::AcoustidId, "Acoustid Id"),
    (Identifier::AcoustidFingerprint, "Acoustid Fingerprint"),
    (Identifier::AlbumArtistId, "MusicBrainz Album Artist Id"),
    (Identifier::ArtistId, "MusicBrainz Artist Id"),
    (Identifier::OriginalArtistId, "MusicBrainz Original Artist Id"),
    (Identifier::AlbumId, "MusicBrainz Album Id"),
    (Identifier::OriginalAlbumId, "MusicBrainz Original Album Id"),
    (Identifier::TrackId, "MusicBrainz Release Track Id"),
    (Identifier::DiscId, "MusicBrainz Disc Id"),
    (Identifier::ReleaseGroupId, "MusicBrainz Release Group Id"),
    (Identifier::WorkId, "MusicBrainz Work Id"),
];

fn frame_id(id: &'static str) -> FrameId<'static> {
    FrameId::Valid(Cow::Borrowed(id))
}

/// Text of a text-like frame. Multiple values are joined with spaces.
fn frame_text(frame: &Frame<'_>) -> Option<String> {
    match frame {
        Frame::Text(f) => Some(f.value.replace('\0', " ")),
        Frame::Timestamp(f) => Some(f.timestamp.to_string()),
        _ => None,
    }
}

fn text(tag: &Id3v2Tag, id: &'static str) -> Option<String> {
    tag.get(&frame_id(id))
        .and_then(frame_text)
        .filter(|v| !v.trim().is_empty())
}

/// First value of a TXXX frame.
fn user_text<'a>(tag: &'a Id3v2Tag, description: &str) -> Option<&'a str> {
    tag.get_user_text(description)
        .and_then(|content| content.split('\0').next())
}

fn lyrics(tag: &Id3v2Tag) -> Option<String> {
    let unsynced = tag.into_iter().find_map(|frame| match frame {
        Frame::UnsynchronizedText(f) if !f.content.is_empty() => Some(f.content.to_string()),
        _ => None,
    });
    unsynced.or_else(|| {
        tag.into_iter().find_map(|frame| match frame {
            Frame::Binary(f) if frame.id().as_str() == "SYLT" => {
                let sylt = SynchronizedTextFrame::parse(&f.data, FrameFlags::default()).ok()?;
                let lines: Vec<&str> = sylt.content.iter().map(|(_, line)| &**line).collect();
                Some(lines.join("\n"))
            }
            _ => None,
        })
    })
}

// ============================================================================
// Read-modify-replace helpers
// ============================================================================

/// Replace the text of a frame, keeping the existing frame's encoding and
/// flags. An empty value removes the frame.
fn replace_text(tag: &mut Id3v2Tag, id: &'static str, value: &str) {
    let existing: Vec<_> = tag.remove(&frame_id(id)).collect();
    if value.is_empty() {
        return;
    }

    let frame = match existing.into_iter().next() {
        Some(Frame::Text(mut f)) => {
            f.value = value.to_owned().into();
            Frame::Text(f)
        }
        _ => Frame::Text(TextInformationFrame::new(
            frame_id(id),
            TextEncoding::UTF8,
            value.to_owned(),
        )),
    };
    tag.insert(frame);
}

/// Replace the unsynchronized lyrics, keeping language and description.
fn replace_lyrics(tag: &mut Id3v2Tag, value: &str) {
    let existing: Vec<_> = tag.remove(&frame_id("USLT")).collect();
    if value.is_empty() {
        return;
    }

    let frame = match existing.into_iter().next() {
        Some(Frame::UnsynchronizedText(mut f)) => {
            f.content = value.to_owned().into();
            f
        }
        _ => UnsynchronizedTextFrame::new(
            TextEncoding::UTF8,
            UNKNOWN_LANGUAGE,
            String::new(),
            value.to_owned(),
        ),
    };
    tag.insert(Frame::UnsynchronizedText(frame));
}

/// One of the two values a POPM frame carries.
#[derive(Debug, Clone, Copy)]
enum PopmValue {
    Rating(u8),
    Counter(u64),
}

/// Set a value on the first POPM frame. Zero clears the value on every POPM
/// frame, and frames left with neither rating nor counter are dropped.
fn update_popularimeter(tag: &mut Id3v2Tag, value: PopmValue) {
    let mut popms = Vec::new();
    let mut others = Vec::new();
    for frame in tag.remove(&frame_id("POPM")) {
        match frame {
            Frame::Popularimeter(p) => popms.push(p),
            other => others.push(other),
        }
    }
    if popms.is_empty() {
        popms.push(PopularimeterFrame::new(String::new(), 0, 0));
    }

    let clears = matches!(value, PopmValue::Rating(0) | PopmValue::Counter(0));
    let touched = if clears { popms.len() } else { 1 };
    for popm in popms.iter_mut().take(touched) {
        match value {
            PopmValue::Rating(rating) => popm.rating = rating,
            PopmValue::Counter(counter) => popm.counter = counter,
        }
    }

    for popm in popms {
        if popm.rating != 0 || popm.counter != 0 {
            tag.insert(Frame::Popularimeter(popm));
        }
    }
    for frame in others {
        tag.insert(frame);
    }
}

fn replace_original_year(tag: &mut Id3v2Tag, year: i32) {
    let current = text(tag, "TDOR").map(|date| year_prefix(&date));
    let _ = tag.remove(&frame_id("TORY")).count();
    if current == Some(year) {
        return;
    }
    let value = SongMetadata::positive(year).map_or_else(String::new, |y| y.to_string());
    replace_text(tag, "TDOR", &value);
}

// ============================================================================
// Adapter
// ============================================================================

impl TagAdapter for Id3v2Tag {
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata) {
        if let Some(disc) = text(self, "TPOS") {
            pending.disc = Some(disc.trim().to_string());
        }
        if let Some(composer) = text(self, "TCOM") {
            song.composer = composer;
        }
        if let Some(grouping) = text(self, "TIT1") {
            song.grouping = grouping;
        }
        if let Some(performer) = text(self, "TOPE") {
            song.performer = performer;
        }
        if let Some(albumartist) = text(self, "TPE2") {
            song.albumartist = albumartist;
        }
        if let Some(compilation) = text(self, "TCMP") {
            pending.compilation = Some(compilation.trim().to_string());
        }
        if let Some(date) = text(self, "TDOR").or_else(|| text(self, "TORY")) {
            song.originalyear = year_prefix(&date);
        }
        if let Some(lyrics) = lyrics(self) {
            song.lyrics = lyrics;
        }

        if self.into_iter().any(|frame| matches!(frame, Frame::Picture(_))) {
            song.art_embedded = true;
        }
        if let Some(comment) = self.into_iter().find_map(|frame| match frame {
            Frame::Comment(c) if c.description != ITUNES_NORMALIZATION => {
                Some(c.content.to_string())
            }
            _ => None,
        }) {
            song.comment = comment;
        }

        if let Some(value) = user_text(self, FMPS_PLAYCOUNT) {
            merge_playcount(song, parse_playcount(value));
        }
        if let Some(value) = user_text(self, FMPS_RATING) {
            let rating = parse_rating(value);
            if rating <= 1.0 {
                merge_rating(song, rating);
            }
        }
        if let Some(Frame::Popularimeter(popm)) = self
            .into_iter()
            .find(|frame| matches!(frame, Frame::Popularimeter(_)))
        {
            merge_playcount(song, u32::try_from(popm.counter).unwrap_or(u32::MAX));
            merge_rating(song, popm_to_rating(popm.rating));
        }

        for frame in self {
            if let Frame::UniqueFileIdentifier(ufid) = frame
                && ufid.owner == MUSICBRAINZ_UFID_OWNER
            {
                let id = String::from_utf8_lossy(&ufid.identifier).trim().to_string();
                if !id.is_empty() {
                    song.musicbrainz_recording_id = id;
                }
            }
        }
        read_identifiers(USER_TEXT_IDS, song, |key| {
            user_text(self, key).map(Cow::Borrowed)
        });
    }

    fn write_tags(&mut self, song: &SongMetadata) {
        replace_text(self, "TPOS", &disc_text(song.disc));
        replace_text(self, "TCOM", &song.composer);
        replace_text(self, "TIT1", &song.grouping);
        replace_text(self, "TOPE", &song.performer);
        replace_text(self, "TPE2", &song.albumartist);
        replace_text(self, "TCMP", &flag_text(song.compilation));
        replace_lyrics(self, &song.lyrics);
        replace_original_year(self, song.originalyear);
    }

    fn write_playcount(&mut self, playcount: u32) {
        if playcount > 0 {
            self.insert_user_text(FMPS_PLAYCOUNT.to_string(), playcount.to_string());
        } else {
            self.remove_user_text(FMPS_PLAYCOUNT);
        }
        update_popularimeter(self, PopmValue::Counter(u64::from(playcount)));
    }

    fn write_rating(&mut self, rating: f32) {
        if rating > 0.0 {
            self.insert_user_text(FMPS_RATING.to_string(), format_rating(rating));
        } else {
            self.remove_user_text(FMPS_RATING);
        }
        let byte = if rating > 0.0 { rating_to_popm(rating) } else { 0 };
        update_popularimeter(self, PopmValue::Rating(byte));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::adapter::join_pending;
    use lofty::id3::v2::{
        BinaryFrame, CommentFrame, SyncTextContentType, TimestampFormat,
        UniqueFileIdentifierFrame,
    };

    fn read(tag: &Id3v2Tag) -> SongMetadata {
        let mut song = SongMetadata::default();
        let mut pending = PendingFields::default();
        tag.read_into(&mut pending, &mut song);
        join_pending(&pending, &mut song);
        song
    }

    fn popm(tag: &Id3v2Tag) -> Option<(u8, u64)> {
        tag.into_iter().find_map(|frame| match frame {
            Frame::Popularimeter(p) => Some((p.rating, p.counter)),
            _ => None,
        })
    }

    fn comment(description: &str, content: &str) -> Frame<'static> {
        Frame::Comment(CommentFrame::new(
            TextEncoding::UTF8,
            *b"eng",
            description.to_string(),
            content.to_string(),
        ))
    }

    #[test]
    fn test_extended_fields_roundtrip() {
        let song = SongMetadata {
            disc: 2,
            composer: "J. S. Bach".to_string(),
            grouping: "Cantatas".to_string(),
            performer: "Collegium".to_string(),
            albumartist: "Various".to_string(),
            compilation: true,
            lyrics: "la la la".to_string(),
            originalyear: 1724,
            ..Default::default()
        };
        let mut tag = Id3v2Tag::new();
        tag.write_tags(&song);

        let read = read(&tag);
        assert_eq!(read.disc, 2);
        assert_eq!(read.composer, "J. S. Bach");
        assert_eq!(read.grouping, "Cantatas");
        assert_eq!(read.performer, "Collegium");
        assert_eq!(read.albumartist, "Various");
        assert!(read.compilation);
        assert_eq!(read.lyrics, "la la la");
        assert_eq!(read.originalyear, 1724);
    }

    #[test]
    fn test_empty_value_removes_frame() {
        let mut tag = Id3v2Tag::new();
        replace_text(&mut tag, "TCOM", "Someone");
        assert!(tag.get(&frame_id("TCOM")).is_some());

        replace_text(&mut tag, "TCOM", "");
        assert!(tag.get(&frame_id("TCOM")).is_none());
    }

    #[test]
    fn test_replace_text_keeps_encoding() {
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::Text(TextInformationFrame::new(
            frame_id("TIT1"),
            TextEncoding::UTF16,
            "Old".to_string(),
        )));

        replace_text(&mut tag, "TIT1", "New");

        match tag.get(&frame_id("TIT1")) {
            Some(Frame::Text(f)) => {
                assert_eq!(f.encoding, TextEncoding::UTF16);
                assert_eq!(f.value, "New");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_disc_with_total() {
        let mut tag = Id3v2Tag::new();
        replace_text(&mut tag, "TPOS", "3/12");
        assert_eq!(read(&tag).disc, 3);
    }

    #[test]
    fn test_comment_skips_itunes_normalization() {
        let mut tag = Id3v2Tag::new();
        tag.insert(comment(ITUNES_NORMALIZATION, " 00000A2B 00000A2B"));
        tag.insert(comment("", "Great record"));

        assert_eq!(read(&tag).comment, "Great record");
    }

    #[test]
    fn test_popm_used_when_fmps_missing() {
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            "someone@example.org".to_string(),
            255,
            7,
        )));

        let song = read(&tag);
        assert_eq!(song.rating, 1.0);
        assert_eq!(song.playcount, 7);
    }

    #[test]
    fn test_fmps_wins_over_popm() {
        let mut tag = Id3v2Tag::new();
        tag.insert_user_text(FMPS_RATING.to_string(), "0.4".to_string());
        tag.insert_user_text(FMPS_PLAYCOUNT.to_string(), "3".to_string());
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            String::new(),
            1,
            40,
        )));

        let song = read(&tag);
        assert_eq!(song.rating, 0.4);
        assert_eq!(song.playcount, 3);
    }

    #[test]
    fn test_out_of_range_fmps_rating_ignored() {
        let mut tag = Id3v2Tag::new();
        tag.insert_user_text(FMPS_RATING.to_string(), "4".to_string());
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            String::new(),
            1,
            0,
        )));

        assert_eq!(read(&tag).rating, 0.2);
    }

    #[test]
    fn test_lyrics_fall_back_to_synced_text() {
        let sylt = SynchronizedTextFrame::new(
            TextEncoding::UTF8,
            *b"eng",
            TimestampFormat::MS,
            SyncTextContentType::Lyrics,
            None,
            vec![(0, "first line".to_string()), (1500, "second line".to_string())],
        );
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::Binary(BinaryFrame::new(
            frame_id("SYLT"),
            sylt.as_bytes().unwrap(),
        )));

        assert_eq!(read(&tag).lyrics, "first line\nsecond line");

        replace_lyrics(&mut tag, "plain lyrics");
        assert_eq!(read(&tag).lyrics, "plain lyrics");
    }

    #[test]
    fn test_clearing_rating_clears_every_popm() {
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            "first@example.org".to_string(),
            255,
            0,
        )));
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            "second@example.org".to_string(),
            128,
            5,
        )));

        tag.write_rating(0.0);

        let song = read(&tag);
        assert!(!song.has_rating());
        assert_eq!(song.playcount, 5);
        assert_eq!(popm(&tag), Some((0, 5)));
    }

    #[test]
    fn test_setting_rating_touches_first_popm_only() {
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            "first@example.org".to_string(),
            1,
            0,
        )));
        tag.insert(Frame::Popularimeter(PopularimeterFrame::new(
            "second@example.org".to_string(),
            128,
            5,
        )));

        tag.write_rating(1.0);

        let ratings: Vec<_> = tag
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Popularimeter(p) => Some((p.email.clone(), p.rating)),
                _ => None,
            })
            .collect();
        assert_eq!(
            ratings,
            vec![
                ("first@example.org".to_string(), 255),
                ("second@example.org".to_string(), 128),
            ]
        );
    }

    #[test]
    fn test_rating_write_and_clear() {
        let mut tag = Id3v2Tag::new();
        tag.write_rating(0.8);
        assert_eq!(user_text(&tag, FMPS_RATING), Some("0.8"));
        assert_eq!(popm(&tag), Some((0xC0, 0)));

        tag.write_rating(0.0);
        assert_eq!(user_text(&tag, FMPS_RATING), None);
        assert_eq!(popm(&tag), None);
    }

    #[test]
    fn test_playcount_zero_removes_field() {
        let mut tag = Id3v2Tag::new();
        tag.write_rating(0.6);
        tag.write_playcount(12);
        assert_eq!(user_text(&tag, FMPS_PLAYCOUNT), Some("12"));
        assert_eq!(popm(&tag), Some((0x80, 12)));

        tag.write_playcount(0);
        assert_eq!(user_text(&tag, FMPS_PLAYCOUNT), None);
        assert_eq!(popm(&tag), Some((0x80, 0)));
        assert_eq!(read(&tag).playcount, 0);
    }

    #[test]
    fn test_identifiers() {
        let mut tag = Id3v2Tag::new();
        tag.insert(Frame::UniqueFileIdentifier(UniqueFileIdentifierFrame::new(
            MUSICBRAINZ_UFID_OWNER.to_string(),
            b"0d5b8d1b-recording".to_vec(),
        )));
        tag.insert_user_text("MusicBrainz Album Id".to_string(), "album-123".to_string());
        tag.insert_user_text("Acoustid Id".to_string(), "acoust-9".to_string());

        let song = read(&tag);
        assert_eq!(song.musicbrainz_recording_id, "0d5b8d1b-recording");
        assert_eq!(song.musicbrainz_album_id, "album-123");
        assert_eq!(song.acoustid_id, "acoust-9");
        assert!(song.musicbrainz_work_id.is_empty());
    }
}
