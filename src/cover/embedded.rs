//! Find and replace cover art inside native tags.
//!
//! Uses lofty's native tag types:
//! - ID3v2 APIC frames (MP3, WAV, AIFF)
//! - FLAC picture blocks and Vorbis comment pictures (FLAC, Ogg)
//! - APE "COVER ART (FRONT)" binary items
//! - MP4 `covr` atoms
//! - ASF WM/Picture attributes

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lofty::ape::ApeTag;
use lofty::flac::FlacFile;
use lofty::id3::v2::{Frame, Id3v2Tag};
use lofty::mp4::Ilst;
use lofty::ogg::{OggPictureStorage, VorbisComments};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::ItemValue;
use tracing::debug;

use super::Cover;
use crate::metadata::ape::COVER_ART_FRONT;
use crate::metadata::asf::{
    AsfAttribute, AsfPicture, AsfResult, AsfTag, PICTURE, PICTURE_FRONT_COVER,
};
use crate::metadata::xiph::{COVER_ART_LEGACY, COVER_ART_MIME_LEGACY};

/// Prefer the front cover, fall back to the first picture.
fn pick<'a>(pictures: impl IntoIterator<Item = &'a Picture>) -> Option<Vec<u8>> {
    let pictures: Vec<&Picture> = pictures
        .into_iter()
        .filter(|p| !p.data().is_empty())
        .collect();
    pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .map(|p| p.data().to_vec())
}

fn front_cover(cover: &Cover) -> Picture {
    Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::from_str(&cover.mime_type)),
        None,
        cover.data.clone(),
    )
}

// ============================================================================
// Extraction
// ============================================================================

pub fn id3v2_cover(tag: &Id3v2Tag) -> Option<Vec<u8>> {
    pick(tag.into_iter().filter_map(|frame| match frame {
        Frame::Picture(f) => Some(&f.picture),
        _ => None,
    }))
}

/// Picture list first, then the legacy base64 COVERART field.
pub fn xiph_cover(tag: &VorbisComments) -> Option<Vec<u8>> {
    pick(tag.pictures().iter().map(|(p, _)| p)).or_else(|| {
        let encoded = tag.get(COVER_ART_LEGACY)?;
        STANDARD
            .decode(encoded.trim())
            .ok()
            .filter(|data| !data.is_empty())
    })
}

pub fn flac_cover(file: &FlacFile) -> Option<Vec<u8>> {
    pick(file.pictures().iter().map(|(p, _)| p))
        .or_else(|| file.vorbis_comments().and_then(xiph_cover))
}

/// Binary item holding "<filename>\0<image bytes>".
pub fn ape_cover(tag: &ApeTag) -> Option<Vec<u8>> {
    let ItemValue::Binary(data) = tag.get(COVER_ART_FRONT)?.value() else {
        return None;
    };
    let start = data.iter().position(|b| *b == 0)? + 1;
    (start < data.len()).then(|| data[start..].to_vec())
}

pub fn mp4_cover(tag: &Ilst) -> Option<Vec<u8>> {
    tag.pictures()?
        .find(|p| !p.data().is_empty())
        .map(|p| p.data().to_vec())
}

pub fn asf_cover(tag: &AsfTag) -> Option<Vec<u8>> {
    let pictures: Vec<AsfPicture> = tag.pictures().filter(|p| !p.data.is_empty()).collect();
    pictures
        .iter()
        .find(|p| p.pic_type == PICTURE_FRONT_COVER)
        .or_else(|| pictures.first())
        .map(|p| p.data.clone())
}

// ============================================================================
// Replacement
// ============================================================================

/// Drop existing front covers, then add the new one if it has data.
pub fn replace_id3v2(tag: &mut Id3v2Tag, cover: &Cover) {
    tag.remove_picture_type(PictureType::CoverFront);
    if !cover.is_empty() {
        tag.insert_picture(front_cover(cover));
    }
}

pub fn replace_xiph(tag: &mut VorbisComments, cover: &Cover) -> lofty::error::Result<()> {
    tag.remove_picture_type(PictureType::CoverFront);
    tag.remove(COVER_ART_LEGACY).for_each(drop);
    tag.remove(COVER_ART_MIME_LEGACY).for_each(drop);
    if !cover.is_empty() {
        tag.insert_picture(front_cover(cover), None)?;
    }
    Ok(())
}

pub fn replace_flac(file: &mut FlacFile, cover: &Cover) -> lofty::error::Result<()> {
    file.remove_picture_type(PictureType::CoverFront);
    if let Some(comments) = file.vorbis_comments_mut() {
        comments.remove_picture_type(PictureType::CoverFront);
        comments.remove(COVER_ART_LEGACY).for_each(drop);
        comments.remove(COVER_ART_MIME_LEGACY).for_each(drop);
    }
    if !cover.is_empty() {
        file.insert_picture(front_cover(cover), None)?;
    }
    Ok(())
}

/// `covr` only holds JPEG or PNG. Any other image type leaves the atom as is.
pub fn replace_mp4(tag: &mut Ilst, cover: &Cover) {
    if cover.is_empty() {
        tag.remove_pictures();
        return;
    }
    match cover.mime_type.as_str() {
        "image/jpeg" | "image/png" => {
            tag.remove_pictures();
            tag.insert_picture(front_cover(cover));
        }
        other => {
            debug!(target: "cover::save", mime = other, "MP4 cover type not supported, keeping existing");
        }
    }
}

pub fn replace_asf(tag: &mut AsfTag, cover: &Cover) -> AsfResult<()> {
    tag.remove_front_covers();
    if !cover.is_empty() {
        let picture = AsfPicture {
            pic_type: PICTURE_FRONT_COVER,
            mime_type: cover.mime_type.clone(),
            data: cover.data.clone(),
        };
        tag.add_attribute(PICTURE, AsfAttribute::Bytes(picture.to_bytes()?));
    }
    Ok(())
}
