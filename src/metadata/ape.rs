//! APE tag mapping (Monkey's Audio, WavPack, Musepack).
//!
//! Item keys are case-insensitive and an item may hold several
//! NUL-separated values.

use lofty::ape::{ApeItem, ApeTag};
use lofty::tag::ItemValue;
use std::borrow::Cow;
use tracing::warn;

use super::adapter::{
    PendingFields, TagAdapter, UPPERCASE_ID_KEYS, disc_text, flag_text, leading_int,
    read_identifiers,
};
use super::rating::{format_rating, merge_playcount, merge_rating, parse_playcount, parse_rating};
use crate::model::SongMetadata;

pub(crate) const COVER_ART_FRONT: &str = "COVER ART (FRONT)";
const FMPS_PLAYCOUNT: &str = "FMPS_Playcount";
const FMPS_RATING: &str = "FMPS_Rating";

/// Text values of an item. Binary items have none.
fn values<'a>(tag: &'a ApeTag, key: &str) -> Vec<&'a str> {
    match tag.get(key).map(ApeItem::value) {
        Some(ItemValue::Text(text) | ItemValue::Locator(text)) => text
            .split('\0')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn first(tag: &ApeTag, key: &str) -> Option<String> {
    values(tag, key).first().map(|v| v.to_string())
}

fn joined(tag: &ApeTag, key: &str, separator: &str) -> Option<String> {
    let values = values(tag, key);
    (!values.is_empty()).then(|| values.join(separator))
}

fn set_item(tag: &mut ApeTag, key: &str, value: &str) {
    tag.remove(key);
    if value.is_empty() {
        return;
    }
    match ApeItem::new(key.to_string(), ItemValue::Text(value.to_string())) {
        Ok(item) => {
            tag.insert(item);
        }
        Err(e) => warn!(target: "metadata::ape", key, error = %e, "Rejected APE item"),
    }
}

impl TagAdapter for ApeTag {
    fn read_into(&self, pending: &mut PendingFields, song: &mut SongMetadata) {
        if let Some(albumartist) = first(self, "ALBUM ARTIST") {
            song.albumartist = albumartist;
        }
        if self.get(COVER_ART_FRONT).is_some() {
            song.art_embedded = true;
        }
        if let Some(compilation) = first(self, "COMPILATION") {
            pending.compilation = Some(leading_int(&compilation).to_string());
        }
        if let Some(disc) = first(self, "DISC") {
            pending.disc = Some(leading_int(&disc).to_string());
        }
        if let Some(performer) = joined(self, "PERFORMER", ", ") {
            song.performer = performer;
        }
        if let Some(composer) = joined(self, "COMPOSER", ", ") {
            song.composer = composer;
        }
        if let Some(grouping) = joined(self, "GROUPING", " ") {
            song.grouping = grouping;
        }
        if let Some(lyrics) = joined(self, "LYRICS", "\n") {
            song.lyrics = lyrics;
        }

        if let Some(playcount) = first(self, FMPS_PLAYCOUNT) {
            merge_playcount(song, parse_playcount(&playcount));
        }
        if let Some(rating) = first(self, FMPS_RATING) {
            merge_rating(song, parse_rating(&rating));
        }

        read_identifiers(UPPERCASE_ID_KEYS, song, |key| first(self, key).map(Cow::Owned));
    }

    fn write_tags(&mut self, song: &SongMetadata) {
        set_item(self, "Album Artist", &song.albumartist);
        set_item(self, "Disc", &disc_text(song.disc));
        set_item(self, "Composer", &song.composer);
        set_item(self, "Grouping", &song.grouping);
        set_item(self, "Performer", &song.performer);
        set_item(self, "Lyrics", &song.lyrics);
        set_item(self, "Compilation", &flag_text(song.compilation));
    }

    fn write_playcount(&mut self, playcount: u32) {
        let value = if playcount > 0 { playcount.to_string() } else { String::new() };
        set_item(self, FMPS_PLAYCOUNT, &value);
    }

    fn write_rating(&mut self, rating: f32) {
        let value = if rating > 0.0 { format_rating(rating) } else { String::new() };
        set_item(self, FMPS_RATING, &value);
    }
}
