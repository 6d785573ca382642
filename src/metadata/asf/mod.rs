//! ASF (Windows Media) attribute mapping.
//!
//! lofty has no ASF container support, so this module carries its own
//! attribute model: the content description fields plus an ordered
//! multimap of "/"-namespaced attributes ("WM/AlbumArtist",
//! "MusicBrainz/Album Id", ...). [`AsfFile`] reads and rewrites the
//! header object that holds them.

mod file;

pub use file::{AsfError, AsfFile, AsfProperties, AsfResult};

use lofty::tag::Accessor;
use std::borrow::Cow;

use super::adapter::{Identifier, PendingFields, TagAdapter, read_identifiers, year_prefix};
use super::rating::{format_rating, merge_playcount, merge_rating, parse_playcount, parse_rating};
use crate::model::SongMetadata;

const ALBUM_TITLE: &str = "WM/AlbumTitle";
const GENRE: &str = "WM/Genre";
const YEAR: &str = "WM/Year";
const TRACK_NUMBER: &str = "WM/TrackNumber";
const ALBUM_ARTIST: &str = "WM/AlbumArtist";
const COMPOSER: &str = "WM/Composer";
const GROUPING: &str = "WM/ContentGroupDescription";
const LYRICS: &str = "WM/Lyrics";
const PART_OF_SET: &str = "WM/PartOfSet";
const IS_COMPILATION: &str = "WM/IsCompilation";
pub(crate) const PICTURE: &str = "WM/Picture";
const ORIGINAL_RELEASE_TIME: &str = "WM/OriginalReleaseTime";
const ORIGINAL_RELEASE_YEAR: &str = "WM/OriginalReleaseYear";
const FMPS_PLAYCOUNT: &str = "FMPS/Playcount";
const FMPS_RATING: &str = "FMPS/Rating";

const ATTRIBUTE_IDS: &[(Identifier, &str)] = &[
    (Identifier::AcoustidId, "Acoustid/Id"),
    (Identifier::AcoustidFingerprint, "Acoustid/Fingerprint"),
    (Identifier::AlbumArtistId, "MusicBrainz/Album Artist Id"),
    (Identifier::ArtistId, "MusicBrainz/Artist Id"),
    (Identifier::OriginalArtistId, "MusicBrainz/Original Artist Id"),
    (Identifier::AlbumId, "MusicBrainz/Album Id"),
    (Identifier::OriginalAlbumId, "MusicBrainz/Original Album Id"),
    (Identifier::RecordingId, "MusicBrainz/Track Id"),
    (Identifier::TrackId, "MusicBrainz/Release Track Id"),
    (Identifier::DiscId, "MusicBrainz/Disc Id"),
    (Identifier::ReleaseGroupId, "MusicBrainz/Release Group Id"),
    (Identifier::WorkId, "MusicBrainz/Work Id"),
];

/// A typed ASF attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsfAttribute {
    Text(String),
    Bool(bool),
    Word(u16),
    DWord(u32),
    QWord(u64),
    Bytes(Vec<u8>),
}

impl AsfAttribute {
    /// Textual form; binary values have none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Word(n) => Some(n.to_string()),
            Self::DWord(n) => Some(n.to_string()),
            Self::QWord(n) => Some(n.to_string()),
            Self::Bytes(_) => None,
        }
    }

    fn to_u32(&self) -> Option<u32> {
        match self {
            Self::Word(n) => Some(u32::from(*n)),
            Self::DWord(n) => Some(*n),
            Self::QWord(n) => u32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Bytes(_) => None,
        }
    }
}

/// ASF metadata: content description plus extended attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsfTag {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub description: String,
    attributes: Vec<(String, AsfAttribute)>,
}

impl AsfTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&AsfAttribute> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Every value of an attribute, in file order.
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AsfAttribute> {
        self.attributes
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All attributes, in file order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AsfAttribute)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Append a value, keeping existing ones.
    pub fn add_attribute(&mut self, name: &str, value: AsfAttribute) {
        self.attributes.push((name.to_string(), value));
    }

    /// Replace every value of an attribute.
    pub fn set_attribute(&mut self, name: &str, value: AsfAttribute) {
        self.remove_attribute(name);
        self.add_attribute(name, value);
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    fn text(&self, name: &str) -> Option<String> {
        self.attribute(name)
            .and_then(AsfAttribute::to_text)
            .filter(|v| !v.trim().is_empty())
    }

    fn set_text(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.remove_attribute(name);
        } else {
            self.set_attribute(name, AsfAttribute::Text(value.to_string()));
        }
    }
}

fn non_empty(value: &str) -> Option<Cow<'_, str>> {
    (!value.is_empty()).then_some(Cow::Borrowed(value))
}

impl Accessor for AsfTag {
    fn title(&self) -> Option<Cow<'_, str>> {
        non_empty(&self.title)
    }
    fn set_title(&mut self, value: String) {
        self.title = value;
    }
    fn remove_title(&mut self) {
        self.title.clear();
    }

    fn artist(&self) -> Option<Cow<'_, str>> {
        non_empty(&self.author)
    }
    fn set_artist(&mut self, value: String) {
        self.author = value;
    }
    fn remove_artist(&mut self) {
        self.author.clear();
    }

    fn comment(&self) -> Option<Cow<'_, str>> {
        non_empty(&self.description)
    }
    fn set_comment(&mut self, value: String) {
        self.description = value;
    }
    fn remove_comment(&mut self) {
        self.description.clear();
    }

    fn album(&self) -> Option<Cow<'_, str>> {
        self.text(ALBUM_TITLE).map(Cow::Owned)
    }
    fn set_album(&mut self, value: String) {
        self.set_text(ALBUM_TITLE, &value);
    }
    fn remove_album(&mut self) {
        self.remove_attribute(ALBUM_TITLE);
    }

    fn genre(&self) -> Option<Cow<'_, str>> {
        self.text(GENRE).map(Cow::Owned)
    }
    fn set_genre(&mut self, value: String) {
        self.set_text(GENRE, &value);
    }
    fn remove_genre(&mut self) {
        self.remove_attribute(GENRE);
    }

    fn year(&self) -> Option<u32> {
        self.text(YEAR)
            .map(|y| year_prefix(&y))
            .and_then(|y| u32::try_from(y).ok())
            .filter(|y| *y > 0)
    }
    fn set_year(&mut self, value: u32) {
        self.set_attribute(YEAR, AsfAttribute::Text(value.to_string()));
    }
    fn remove_year(&mut self) {
        self.remove_attribute(YEAR);
    }

    fn track(&self) -> Option<u32> {
        self.attribute(TRACK_NUMBER).and_then(AsfAttribute::to_u32)
    }
    fn set_track(&mut self, value: u32) {
        self.set_attribute(TRACK_NUMBER, AsfAttribute::DWord(value));
    }
    fn remove_track(&mut self) {
        self.remove_attribute(TRACK_NUMBER);
    }
}

impl TagAdapter for AsfTag {
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata) {
        if let Some(albumartist) = self.text(ALBUM_ARTIST) {
            song.albumartist = albumartist;
        }
        if let Some(composer) = self.text(COMPOSER) {
            song.composer = composer;
        }
        if let Some(grouping) = self.text(GROUPING) {
            song.grouping = grouping;
        }
        if let Some(lyrics) = self.text(LYRICS) {
            song.lyrics = lyrics;
        }
        if let Some(disc) = self.text(PART_OF_SET) {
            pending.disc = Some(disc.trim().to_string());
        }
        if let Some(compilation) = self.text(IS_COMPILATION) {
            pending.compilation = Some(compilation);
        }
        if self.contains(PICTURE) {
            song.art_embedded = true;
        }
        if let Some(date) = self
            .text(ORIGINAL_RELEASE_TIME)
            .or_else(|| self.text(ORIGINAL_RELEASE_YEAR))
        {
            song.originalyear = year_prefix(&date);
        }

        if let Some(playcount) = self.text(FMPS_PLAYCOUNT) {
            merge_playcount(song, parse_playcount(&playcount));
        }
        if let Some(rating) = self.text(FMPS_RATING) {
            merge_rating(song, parse_rating(&rating));
        }

        read_identifiers(ATTRIBUTE_IDS, song, |name| self.text(name).map(Cow::Owned));
    }

    fn write_tags(&mut self, song: &SongMetadata) {
        self.set_text(ALBUM_ARTIST, &song.albumartist);
        self.set_text(COMPOSER, &song.composer);
        self.set_text(GROUPING, &song.grouping);
        self.set_text(LYRICS, &song.lyrics);

        match SongMetadata::positive(song.disc) {
            Some(disc) => self.set_attribute(PART_OF_SET, AsfAttribute::Text(disc.to_string())),
            None => self.remove_attribute(PART_OF_SET),
        }
        self.set_attribute(IS_COMPILATION, AsfAttribute::Bool(song.compilation));

        let current = self
            .text(ORIGINAL_RELEASE_TIME)
            .or_else(|| self.text(ORIGINAL_RELEASE_YEAR))
            .map(|date| year_prefix(&date));
        if current != Some(song.originalyear) {
            self.remove_attribute(ORIGINAL_RELEASE_TIME);
            match SongMetadata::positive(song.originalyear) {
                Some(year) => self.set_attribute(
                    ORIGINAL_RELEASE_YEAR,
                    AsfAttribute::Text(year.to_string()),
                ),
                None => self.remove_attribute(ORIGINAL_RELEASE_YEAR),
            }
        }
    }

    fn write_playcount(&mut self, playcount: u32) {
        if playcount > 0 {
            self.set_attribute(FMPS_PLAYCOUNT, AsfAttribute::DWord(playcount));
        } else {
            self.remove_attribute(FMPS_PLAYCOUNT);
        }
    }

    fn write_rating(&mut self, rating: f32) {
        if rating > 0.0 {
            self.set_attribute(FMPS_RATING, AsfAttribute::Text(format_rating(rating)));
        } else {
            self.remove_attribute(FMPS_RATING);
        }
    }
}

// ============================================================================
// WM/Picture
// ============================================================================

/// Front cover picture type, as in ID3v2 APIC.
pub(crate) const PICTURE_FRONT_COVER: u8 = 3;

/// A decoded WM/Picture value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsfPicture {
    pub pic_type: u8,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl AsfPicture {
    /// Layout: type byte, 32-bit data length, NUL-terminated UTF-16LE MIME
    /// type and description, then the image data.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let (&pic_type, rest) = raw.split_first()?;
        let len = u32::from_le_bytes(rest.get(..4)?.try_into().ok()?);
        let rest = &rest[4..];
        let (mime_type, rest) = split_utf16z(rest)?;
        let (_description, rest) = split_utf16z(rest)?;
        let data = rest.get(..usize::try_from(len).ok()?)?.to_vec();
        Some(Self {
            pic_type,
            mime_type,
            data,
        })
    }

    pub fn to_bytes(&self) -> AsfResult<Vec<u8>> {
        let mut out = vec![self.pic_type];
        out.extend_from_slice(&picture_len(self.data.len())?.to_le_bytes());
        // MIME type, its terminator, then an empty description
        for unit in self.mime_type.encode_utf16().chain([0, 0]) {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// The picture length field is 32 bits wide.
fn picture_len(len: usize) -> AsfResult<u32> {
    u32::try_from(len).map_err(|_| AsfError::TooLarge("WM/Picture data"))
}

/// Split at the first UTF-16 NUL.
fn split_utf16z(raw: &[u8]) -> Option<(String, &[u8])> {
    let end = raw.chunks_exact(2).position(|pair| pair == [0, 0])? * 2;
    let units: Vec<u16> = raw[..end]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Some((String::from_utf16_lossy(&units), &raw[end + 2..]))
}

impl AsfTag {
    /// Every WM/Picture value that decodes.
    pub fn pictures(&self) -> impl Iterator<Item = AsfPicture> + '_ {
        self.attributes_named(PICTURE).filter_map(|value| match value {
            AsfAttribute::Bytes(raw) => AsfPicture::parse(raw),
            _ => None,
        })
    }

    /// Drop front covers, keeping pictures of other types.
    pub fn remove_front_covers(&mut self) {
        self.attributes.retain(|(key, value)| {
            key != PICTURE
                || !matches!(
                    value,
                    AsfAttribute::Bytes(raw)
                        if AsfPicture::parse(raw).is_some_and(|p| p.pic_type == PICTURE_FRONT_COVER)
                )
        });
    }
}
