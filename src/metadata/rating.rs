//! Rating and play count conversions.
//!
//! Ratings are floats in (0, 1]. ID3v2 POPM frames store a byte, which is
//! bucketed into fifths; FMPS text fields store the float as a decimal.

use crate::model::SongMetadata;

/// Map a POPM rating byte onto the rating scale.
pub fn popm_to_rating(byte: u8) -> f32 {
    match byte {
        0 => 0.0,
        1..=0x3F => 0.2,
        0x40..=0x7F => 0.4,
        0x80..=0xBF => 0.6,
        0xC0..=0xFB => 0.8,
        _ => 1.0,
    }
}

/// Map a rating onto a POPM rating byte.
pub fn rating_to_popm(rating: f32) -> u8 {
    if rating < 0.2 {
        0x00
    } else if rating < 0.4 {
        0x01
    } else if rating < 0.6 {
        0x40
    } else if rating < 0.8 {
        0x80
    } else if rating < 1.0 {
        0xC0
    } else {
        0xFF
    }
}

/// Decimal text form used by FMPS fields ("0.8", "1").
pub fn format_rating(rating: f32) -> String {
    rating.to_string()
}

/// Parse an FMPS rating. Unparseable text yields 0.0 (unrated).
pub fn parse_rating(text: &str) -> f32 {
    text.trim().parse::<f32>().unwrap_or(0.0)
}

/// Parse an FMPS play count. Negative or unparseable text yields 0.
pub fn parse_playcount(text: &str) -> u32 {
    let text = text.trim();
    text.parse::<u32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|v| *v > 0.0).map(|v| v as u32))
        .unwrap_or(0)
}

/// Apply a play count found in a tag unless one is already set.
pub fn merge_playcount(song: &mut SongMetadata, playcount: u32) {
    if song.playcount == 0 && playcount > 0 {
        song.playcount = playcount;
    }
}

/// Apply a rating found in a tag unless one is already set.
pub fn merge_rating(song: &mut SongMetadata, rating: f32) {
    if !song.has_rating() && rating > 0.0 {
        song.rating = rating;
    }
}
