//! MP4 `ilst` atom mapping.
//!
//! Standard fields use four-character atoms (`©wrt`, `aART`, ...). Ratings,
//! play counts and identifiers use iTunes freeform atoms
//! (`----:com.apple.iTunes:<name>`).

use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst};
use lofty::tag::Accessor;
use std::borrow::Cow;

use super::adapter::{Identifier, PendingFields, TagAdapter, read_identifiers, year_prefix};
use super::rating::{format_rating, merge_playcount, merge_rating, parse_playcount, parse_rating};
use crate::model::SongMetadata;

const ITUNES_MEAN: &str = "com.apple.iTunes";

const ALBUM_ARTIST: [u8; 4] = *b"aART";
const COMPOSER: [u8; 4] = [0xA9, b'w', b'r', b't'];
const GROUPING: [u8; 4] = [0xA9, b'g', b'r', b'p'];
const LYRICS: [u8; 4] = [0xA9, b'l', b'y', b'r'];
const COMPILATION: [u8; 4] = *b"cpil";

const ORIGINAL_YEAR: &str = "ORIGINAL YEAR";
const FMPS_PLAYCOUNT: &str = "FMPS_Playcount";
const FMPS_RATING: &str = "FMPS_Rating";

const FREEFORM_IDS: &[(Identifier, &str)] = &[
    (Identifier::AcoustidId, "Acoustid Id"),
    (Identifier::AcoustidFingerprint, "Acoustid Fingerprint"),
    (Identifier::AlbumArtistId, "MusicBrainz Album Artist Id"),
    (Identifier::ArtistId, "MusicBrainz Artist Id"),
    (Identifier::OriginalArtistId, "MusicBrainz Original Artist Id"),
    (Identifier::AlbumId, "MusicBrainz Album Id"),
    (Identifier::OriginalAlbumId, "MusicBrainz Original Album Id"),
    (Identifier::RecordingId, "MusicBrainz Track Id"),
    (Identifier::TrackId, "MusicBrainz Release Track Id"),
    (Identifier::DiscId, "MusicBrainz Disc Id"),
    (Identifier::ReleaseGroupId, "MusicBrainz Release Group Id"),
    (Identifier::WorkId, "MusicBrainz Work Id"),
];

fn fourcc(code: [u8; 4]) -> AtomIdent<'static> {
    AtomIdent::Fourcc(code)
}

fn freeform(name: &str) -> AtomIdent<'static> {
    AtomIdent::Freeform {
        mean: Cow::Borrowed(ITUNES_MEAN),
        name: Cow::Owned(name.to_string()),
    }
}

fn strings(tag: &Ilst, ident: &AtomIdent<'_>) -> Vec<String> {
    tag.get(ident)
        .map(|atom| {
            atom.data()
                .filter_map(|data| match data {
                    AtomData::UTF8(s) | AtomData::UTF16(s) => Some(s.clone()),
                    _ => None,
                })
                .filter(|s| !s.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn joined(tag: &Ilst, ident: &AtomIdent<'_>, separator: &str) -> Option<String> {
    let values = strings(tag, ident);
    (!values.is_empty()).then(|| values.join(separator))
}

fn first(tag: &Ilst, ident: &AtomIdent<'_>) -> Option<String> {
    strings(tag, ident).into_iter().next()
}

fn flag(tag: &Ilst, ident: &AtomIdent<'_>) -> Option<bool> {
    tag.get(ident)?.data().find_map(|data| match data {
        AtomData::Bool(b) => Some(*b),
        AtomData::SignedInteger(i) => Some(*i != 0),
        AtomData::UnsignedInteger(u) => Some(*u != 0),
        AtomData::Unknown { data, .. } => Some(data.iter().any(|b| *b != 0)),
        _ => None,
    })
}

fn set_text(tag: &mut Ilst, ident: AtomIdent<'static>, value: &str) {
    tag.remove(&ident).for_each(drop);
    if !value.is_empty() {
        tag.insert(Atom::new(ident, AtomData::UTF8(value.to_string())));
    }
}

impl TagAdapter for Ilst {
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata) {
        if let Some(albumartist) = first(self, &fourcc(ALBUM_ARTIST)) {
            song.albumartist = albumartist;
        }
        if self
            .pictures()
            .is_some_and(|mut pictures| pictures.any(|p| !p.data().is_empty()))
        {
            song.art_embedded = true;
        }
        if let Some(disc) = self.disk() {
            pending.disc = Some(disc.to_string());
        }
        if let Some(composer) = joined(self, &fourcc(COMPOSER), ", ") {
            song.composer = composer;
        }
        if let Some(grouping) = joined(self, &fourcc(GROUPING), " ") {
            song.grouping = grouping;
        }
        if let Some(lyrics) = joined(self, &fourcc(LYRICS), " ") {
            song.lyrics = lyrics;
        }
        if let Some(date) = first(self, &freeform(ORIGINAL_YEAR)) {
            song.originalyear = year_prefix(&date);
        }
        if let Some(compilation) = flag(self, &fourcc(COMPILATION)) {
            pending.compilation = Some(if compilation { "1" } else { "0" }.to_string());
        }

        if let Some(playcount) = first(self, &freeform(FMPS_PLAYCOUNT)) {
            merge_playcount(song, parse_playcount(&playcount));
        }
        if let Some(rating) = first(self, &freeform(FMPS_RATING)) {
            merge_rating(song, parse_rating(&rating));
        }

        read_identifiers(FREEFORM_IDS, song, |name| {
            joined(self, &freeform(name), " ").map(Cow::Owned)
        });
    }

    fn write_tags(&mut self, song: &SongMetadata) {
        // Only the disc number is kept; a missing number drops the atom.
        self.remove_disk();
        if let Some(disc) = SongMetadata::positive(song.disc) {
            self.set_disk(disc);
        }

        set_text(self, fourcc(COMPOSER), &song.composer);
        set_text(self, fourcc(GROUPING), &song.grouping);
        set_text(self, fourcc(LYRICS), &song.lyrics);
        set_text(self, fourcc(ALBUM_ARTIST), &song.albumartist);

        self.remove(&fourcc(COMPILATION)).for_each(drop);
        self.insert(Atom::new(
            fourcc(COMPILATION),
            AtomData::Bool(song.compilation),
        ));
    }

    fn write_playcount(&mut self, playcount: u32) {
        let value = if playcount > 0 { playcount.to_string() } else { String::new() };
        set_text(self, freeform(FMPS_PLAYCOUNT), &value);
    }

    fn write_rating(&mut self, rating: f32) {
        let value = if rating > 0.0 { format_rating(rating) } else { String::new() };
        set_text(self, freeform(FMPS_RATING), &value);
    }
}
