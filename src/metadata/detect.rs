//! Container detection and native file handles.
//!
//! The probe result is resolved once into a [`TaggedAudio`] variant; every
//! later step dispatches with a `match` on it instead of re-probing.
//!
//! ASF is sniffed before probing, since lofty does not know the container.

use lofty::aac::AacFile;
use lofty::ape::ApeFile;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::{AudioFile, FileType as CodecFileType};
use lofty::flac::FlacFile;
use lofty::iff::aiff::AiffFile;
use lofty::iff::wav::WavFile;
use lofty::mp4::Mp4File;
use lofty::mpeg::MpegFile;
use lofty::musepack::MpcFile;
use lofty::ogg::{OggPictureStorage, OpusFile, SpeexFile, VorbisFile};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::properties::FileProperties;
use lofty::tag::Accessor;
use lofty::wavpack::WavPackFile;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use super::adapter::TagAdapter;
use super::asf::{AsfFile, AsfProperties};
use crate::error::{Result, TagError};
use crate::model::FileType;

/// Which adapter family a file's primary tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFamily {
    Id3v2,
    Xiph,
    Ape,
    Mp4,
    Asf,
}

/// Audio stream properties, whatever the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioProperties {
    pub duration: Duration,
    /// kbps
    pub overall_bitrate: Option<u32>,
    /// kbps
    pub audio_bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
}

impl From<FileProperties> for AudioProperties {
    fn from(props: FileProperties) -> Self {
        Self {
            duration: props.duration(),
            overall_bitrate: props.overall_bitrate(),
            audio_bitrate: props.audio_bitrate(),
            sample_rate: props.sample_rate(),
            bit_depth: props.bit_depth(),
        }
    }
}

impl From<&AsfProperties> for AudioProperties {
    fn from(props: &AsfProperties) -> Self {
        Self {
            duration: props.duration,
            overall_bitrate: props.overall_bitrate,
            audio_bitrate: props.audio_bitrate,
            sample_rate: props.sample_rate,
            bit_depth: props.bit_depth,
        }
    }
}

/// Map a codec-level file type onto the canonical enumeration.
pub fn classify(file_type: &CodecFileType) -> FileType {
    match file_type {
        CodecFileType::Wav => FileType::Wav,
        CodecFileType::Flac => FileType::Flac,
        CodecFileType::WavPack => FileType::WavPack,
        CodecFileType::Vorbis => FileType::OggVorbis,
        CodecFileType::Opus => FileType::OggOpus,
        CodecFileType::Speex => FileType::OggSpeex,
        CodecFileType::Mpeg | CodecFileType::Aac => FileType::Mpeg,
        CodecFileType::Mp4 => FileType::Mp4,
        CodecFileType::Aiff => FileType::Aiff,
        CodecFileType::Mpc => FileType::Mpc,
        CodecFileType::Ape => FileType::Ape,
        _ => FileType::Unknown,
    }
}

/// An opened audio file with native access to its tags.
pub enum TaggedAudio {
    Wav(WavFile),
    Flac(FlacFile),
    WavPack(WavPackFile),
    Vorbis(VorbisFile),
    Opus(OpusFile),
    Speex(SpeexFile),
    Mpeg(MpegFile),
    Aac(AacFile),
    Mp4(Mp4File),
    Aiff(AiffFile),
    Mpc(MpcFile),
    Ape(ApeFile),
    Asf(AsfFile),
}

/// Get the tag of an optional-tag file, inserting an empty one if missing.
macro_rules! get_or_insert {
    ($file:expr, $get:ident, $get_mut:ident, $set:ident) => {{
        if $file.$get().is_none() {
            $file.$set(Default::default());
        }
        $file.$get_mut().map(|tag| tag as &mut dyn TagAdapter)
    }};
}

impl TaggedAudio {
    /// Probe and parse a file.
    ///
    /// A file whose container cannot be classified is `Unsupported`; a
    /// recognized container that fails to parse is a `FileOpenError`.
    pub fn open(path: &Path) -> Result<Self> {
        if AsfFile::sniff(path).map_err(|e| TagError::open(path, e))? {
            let mut file = File::open(path).map_err(|e| TagError::open(path, e))?;
            return AsfFile::read_from(&mut file)
                .map(Self::Asf)
                .map_err(|e| TagError::open(path, e));
        }

        let probe = Probe::open(path)
            .map_err(|e| TagError::open(path, e))?
            .guess_file_type()
            .map_err(|e| TagError::open(path, e))?;

        let Some(codec_type) = probe.file_type() else {
            return Err(TagError::unsupported(path, "container format not recognized"));
        };
        if classify(&codec_type) == FileType::Unknown {
            return Err(TagError::unsupported(
                path,
                format!("no tag support for {codec_type:?}"),
            ));
        }
        drop(probe);

        let mut file = File::open(path).map_err(|e| TagError::open(path, e))?;
        let options = ParseOptions::new();
        let audio = match codec_type {
            CodecFileType::Wav => WavFile::read_from(&mut file, options).map(Self::Wav),
            CodecFileType::Flac => FlacFile::read_from(&mut file, options).map(Self::Flac),
            CodecFileType::WavPack => WavPackFile::read_from(&mut file, options).map(Self::WavPack),
            CodecFileType::Vorbis => VorbisFile::read_from(&mut file, options).map(Self::Vorbis),
            CodecFileType::Opus => OpusFile::read_from(&mut file, options).map(Self::Opus),
            CodecFileType::Speex => SpeexFile::read_from(&mut file, options).map(Self::Speex),
            CodecFileType::Mpeg => MpegFile::read_from(&mut file, options).map(Self::Mpeg),
            CodecFileType::Aac => AacFile::read_from(&mut file, options).map(Self::Aac),
            CodecFileType::Mp4 => Mp4File::read_from(&mut file, options).map(Self::Mp4),
            CodecFileType::Aiff => AiffFile::read_from(&mut file, options).map(Self::Aiff),
            CodecFileType::Mpc => MpcFile::read_from(&mut file, options).map(Self::Mpc),
            CodecFileType::Ape => ApeFile::read_from(&mut file, options).map(Self::Ape),
            other => {
                return Err(TagError::unsupported(path, format!("no tag support for {other:?}")));
            }
        };
        audio.map_err(|e| TagError::open(path, e))
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::Wav(_) => FileType::Wav,
            Self::Flac(_) => FileType::Flac,
            Self::WavPack(_) => FileType::WavPack,
            Self::Vorbis(_) => FileType::OggVorbis,
            Self::Opus(_) => FileType::OggOpus,
            Self::Speex(_) => FileType::OggSpeex,
            Self::Mpeg(_) | Self::Aac(_) => FileType::Mpeg,
            Self::Mp4(_) => FileType::Mp4,
            Self::Aiff(_) => FileType::Aiff,
            Self::Mpc(_) => FileType::Mpc,
            Self::Ape(_) => FileType::Ape,
            Self::Asf(_) => FileType::Asf,
        }
    }

    pub fn family(&self) -> TagFamily {
        match self {
            Self::Wav(_) | Self::Mpeg(_) | Self::Aac(_) | Self::Aiff(_) => TagFamily::Id3v2,
            Self::Flac(_) | Self::Vorbis(_) | Self::Opus(_) | Self::Speex(_) => TagFamily::Xiph,
            Self::WavPack(_) | Self::Mpc(_) | Self::Ape(_) => TagFamily::Ape,
            Self::Mp4(_) => TagFamily::Mp4,
            Self::Asf(_) => TagFamily::Asf,
        }
    }

    pub fn properties(&self) -> AudioProperties {
        let props: FileProperties = match self {
            Self::Wav(f) => f.properties().clone().into(),
            Self::Flac(f) => f.properties().clone().into(),
            Self::WavPack(f) => f.properties().clone().into(),
            Self::Vorbis(f) => f.properties().clone().into(),
            Self::Opus(f) => f.properties().clone().into(),
            Self::Speex(f) => f.properties().clone().into(),
            Self::Mpeg(f) => f.properties().clone().into(),
            Self::Aac(f) => f.properties().clone().into(),
            Self::Mp4(f) => f.properties().clone().into(),
            Self::Aiff(f) => f.properties().clone().into(),
            Self::Mpc(f) => f.properties().clone().into(),
            Self::Ape(f) => f.properties().clone().into(),
            Self::Asf(f) => return f.properties().into(),
        };
        props.into()
    }

    /// The primary tag, if the file has one.
    pub fn tag(&self) -> Option<&dyn TagAdapter> {
        match self {
            Self::Wav(f) => f.id3v2().map(|t| t as &dyn TagAdapter),
            Self::Mpeg(f) => f.id3v2().map(|t| t as &dyn TagAdapter),
            Self::Aac(f) => f.id3v2().map(|t| t as &dyn TagAdapter),
            Self::Aiff(f) => f.id3v2().map(|t| t as &dyn TagAdapter),
            Self::Flac(f) => f.vorbis_comments().map(|t| t as &dyn TagAdapter),
            Self::Vorbis(f) => Some(f.vorbis_comments()),
            Self::Opus(f) => Some(f.vorbis_comments()),
            Self::Speex(f) => Some(f.vorbis_comments()),
            Self::WavPack(f) => f.ape().map(|t| t as &dyn TagAdapter),
            Self::Mpc(f) => f.ape().map(|t| t as &dyn TagAdapter),
            Self::Ape(f) => f.ape().map(|t| t as &dyn TagAdapter),
            Self::Mp4(f) => f.ilst().map(|t| t as &dyn TagAdapter),
            Self::Asf(f) => Some(f.tag()),
        }
    }

    /// Secondary tags, in lookup order, consulted for generic fields the
    /// primary tag lacks.
    pub fn fallback_tags(&self) -> Vec<&dyn Accessor> {
        let (first, second): (Option<&dyn Accessor>, Option<&dyn Accessor>) = match self {
            Self::Mpeg(f) => (
                f.ape().map(|t| t as &dyn Accessor),
                f.id3v1().map(|t| t as &dyn Accessor),
            ),
            Self::Wav(f) => (f.riff_info().map(|t| t as &dyn Accessor), None),
            Self::Aac(f) => (f.id3v1().map(|t| t as &dyn Accessor), None),
            Self::WavPack(f) => (f.id3v1().map(|t| t as &dyn Accessor), None),
            Self::Mpc(f) => (f.id3v1().map(|t| t as &dyn Accessor), None),
            Self::Ape(f) => (f.id3v1().map(|t| t as &dyn Accessor), None),
            _ => (None, None),
        };
        first.into_iter().chain(second).collect()
    }

    /// The primary tag, created empty when the file has none yet.
    pub fn tag_or_insert(&mut self) -> Option<&mut dyn TagAdapter> {
        match self {
            Self::Wav(f) => get_or_insert!(f, id3v2, id3v2_mut, set_id3v2),
            Self::Mpeg(f) => get_or_insert!(f, id3v2, id3v2_mut, set_id3v2),
            Self::Aac(f) => get_or_insert!(f, id3v2, id3v2_mut, set_id3v2),
            Self::Aiff(f) => get_or_insert!(f, id3v2, id3v2_mut, set_id3v2),
            Self::Flac(f) => get_or_insert!(f, vorbis_comments, vorbis_comments_mut, set_vorbis_comments),
            Self::Vorbis(f) => Some(f.vorbis_comments_mut()),
            Self::Opus(f) => Some(f.vorbis_comments_mut()),
            Self::Speex(f) => Some(f.vorbis_comments_mut()),
            Self::WavPack(f) => get_or_insert!(f, ape, ape_mut, set_ape),
            Self::Mpc(f) => get_or_insert!(f, ape, ape_mut, set_ape),
            Self::Ape(f) => get_or_insert!(f, ape, ape_mut, set_ape),
            Self::Mp4(f) => get_or_insert!(f, ilst, ilst_mut, set_ilst),
            Self::Asf(f) => Some(f.tag_mut()),
        }
    }

    /// Whether a FLAC picture block holds a non-empty front cover.
    pub fn has_flac_front_cover(&self) -> bool {
        match self {
            Self::Flac(f) => f
                .pictures()
                .iter()
                .any(|(p, _)| p.pic_type() == PictureType::CoverFront && !p.data().is_empty()),
            _ => false,
        }
    }

    /// Write every tag back to `path`.
    pub fn save(&self, path: &Path, options: WriteOptions) -> Result<()> {
        let result = match self {
            Self::Asf(f) => return f.save_to_path(path).map_err(|e| TagError::save(path, e)),
            Self::Wav(f) => f.save_to_path(path, options),
            Self::Flac(f) => save_flac(f, path, options),
            Self::WavPack(f) => f.save_to_path(path, options),
            Self::Vorbis(f) => f.save_to_path(path, options),
            Self::Opus(f) => f.save_to_path(path, options),
            Self::Speex(f) => f.save_to_path(path, options),
            Self::Mpeg(f) => f.save_to_path(path, options),
            Self::Aac(f) => f.save_to_path(path, options),
            Self::Mp4(f) => f.save_to_path(path, options),
            Self::Aiff(f) => f.save_to_path(path, options),
            Self::Mpc(f) => f.save_to_path(path, options),
            Self::Ape(f) => f.save_to_path(path, options),
        };
        result.map_err(|e| TagError::save(path, e))
    }
}

/// PADDING given to a stream whose only metadata block is STREAMINFO.
const FLAC_PADDING: u32 = 1024;

/// Rewrite a FLAC file in memory, then swap it in.
///
/// The writer only keeps the metadata chain intact when it already ends in
/// a PADDING block, so a lone STREAMINFO gets one first and padding is never
/// requested from the writer.
fn save_flac(file: &FlacFile, path: &Path, options: WriteOptions) -> lofty::error::Result<()> {
    let mut bytes = std::fs::read(path)?;
    pad_lone_streaminfo(&mut bytes);
    let mut staged = Cursor::new(bytes);
    file.save_to(&mut staged, options.preferred_padding(0))?;
    super::replace_file(path, staged.get_ref())?;
    Ok(())
}

fn pad_lone_streaminfo(bytes: &mut Vec<u8>) {
    // Last-block flag set on block type 0
    if bytes.len() < 8 || !bytes.starts_with(b"fLaC") || bytes[4] != 0x80 {
        return;
    }
    let end = 8 + u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]) as usize;
    if end > bytes.len() {
        return;
    }
    bytes[4] = 0x00;
    let mut padding = vec![0_u8; 4 + FLAC_PADDING as usize];
    padding[0] = 0x81;
    padding[1..4].copy_from_slice(&FLAC_PADDING.to_be_bytes()[1..]);
    bytes.splice(end..end, padding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_utils::{
        asf_bytes, flac_bytes, flac_streaminfo_only_bytes, wav_bytes, write_fixture,
    };

    #[test]
    fn test_lone_streaminfo_gets_padding() {
        let original = flac_streaminfo_only_bytes();
        let mut bytes = original.clone();
        pad_lone_streaminfo(&mut bytes);

        assert_eq!(bytes[4], 0x00);
        assert_eq!(&bytes[42..46], &[0x81, 0x00, 0x04, 0x00]);
        assert_eq!(bytes.len(), original.len() + 4 + FLAC_PADDING as usize);

        let mut padded = flac_bytes();
        let before = padded.clone();
        pad_lone_streaminfo(&mut padded);
        assert_eq!(padded, before);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&CodecFileType::Flac), FileType::Flac);
        assert_eq!(classify(&CodecFileType::Opus), FileType::OggOpus);
        assert_eq!(classify(&CodecFileType::Aac), FileType::Mpeg);
        assert_eq!(classify(&CodecFileType::Custom("tracker")), FileType::Unknown);
    }

    #[test]
    fn test_open_wav() {
        let (_dir, path) = write_fixture("tone.wav", &wav_bytes());
        let audio = TaggedAudio::open(&path).unwrap();

        assert_eq!(audio.file_type(), FileType::Wav);
        assert_eq!(audio.family(), TagFamily::Id3v2);
        assert_eq!(audio.properties().sample_rate, Some(8000));
        assert_eq!(audio.properties().bit_depth, Some(16));
        assert!(audio.tag().is_none());
    }

    #[test]
    fn test_open_flac() {
        let (_dir, path) = write_fixture("tone.flac", &flac_bytes());
        let audio = TaggedAudio::open(&path).unwrap();

        assert_eq!(audio.file_type(), FileType::Flac);
        assert_eq!(audio.family(), TagFamily::Xiph);
        assert!(!audio.has_flac_front_cover());
    }

    #[test]
    fn test_open_asf() {
        let (_dir, path) = write_fixture("song.wma", &asf_bytes());
        let audio = TaggedAudio::open(&path).unwrap();

        assert_eq!(audio.file_type(), FileType::Asf);
        assert_eq!(audio.family(), TagFamily::Asf);
        assert_eq!(audio.properties().sample_rate, Some(44_100));
        assert_eq!(audio.properties().duration, Duration::from_secs(1));
    }

    #[test]
    fn test_tag_or_insert_creates_tag() {
        let (_dir, path) = write_fixture("tone.wav", &wav_bytes());
        let mut audio = TaggedAudio::open(&path).unwrap();

        assert!(audio.tag_or_insert().is_some());
        assert!(audio.tag().is_some());
    }

    #[test]
    fn test_unrecognized_container_is_unsupported() {
        let (_dir, path) = write_fixture("notes.txt", b"just some text, not audio");
        let err = TaggedAudio::open(&path).err().unwrap();
        assert_eq!(err.code(), ErrorCode::Unsupported);
    }

    #[test]
    fn test_corrupt_container_fails_to_open() {
        let (_dir, path) = write_fixture("broken.flac", b"fLaC garbage");
        let err = TaggedAudio::open(&path).err().unwrap();
        assert_eq!(err.code(), ErrorCode::FileOpenError);
    }
}
