//! Canonical song metadata shared by every tag format.
//!
//! A [`SongMetadata`] is filled by the read pipeline and consumed by the
//! write pipeline. String fields use the empty string for "absent";
//! numeric fields use [`ABSENT`] once a read has finished.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Sentinel for numeric fields that carry no value.
pub const ABSENT: i32 = -1;

/// Container formats known to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Unknown,
    Wav,
    Flac,
    WavPack,
    OggFlac,
    OggVorbis,
    OggOpus,
    OggSpeex,
    Mpeg,
    Mp4,
    Asf,
    Aiff,
    Mpc,
    TrueAudio,
    Ape,
    Mod,
    S3m,
    Xm,
    It,
    Dsf,
    Dsdiff,
}

impl FileType {
    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Wav => "WAV",
            Self::Flac => "FLAC",
            Self::WavPack => "WavPack",
            Self::OggFlac => "Ogg FLAC",
            Self::OggVorbis => "Ogg Vorbis",
            Self::OggOpus => "Ogg Opus",
            Self::OggSpeex => "Ogg Speex",
            Self::Mpeg => "MP3",
            Self::Mp4 => "MP4 AAC",
            Self::Asf => "Windows Media audio",
            Self::Aiff => "AIFF",
            Self::Mpc => "MPC",
            Self::TrueAudio => "TrueAudio",
            Self::Ape => "Monkey's Audio",
            Self::Mod => "Module Music Format",
            Self::S3m => "ScreamTracker III",
            Self::Xm => "FastTracker 2",
            Self::It => "Impulse Tracker",
            Self::Dsf => "DSF",
            Self::Dsdiff => "DSDIFF",
        }
    }
}

bitflags! {
    /// Which groups of fields a write touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SaveFields: u32 {
        /// Generic and extended text/numeric tags
        const TAGS = 1 << 0;
        const PLAYCOUNT = 1 << 1;
        const RATING = 1 << 2;
        /// Embedded front cover
        const COVER = 1 << 3;
    }
}

/// One song's metadata in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongMetadata {
    // Identity
    pub basefilename: String,
    pub url: String,
    pub filesize: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub lastseen: i64,
    pub filetype: FileType,
    pub valid: bool,

    // Core tags
    pub title: String,
    pub artist: String,
    pub album: String,
    pub albumartist: String,
    pub genre: String,
    pub composer: String,
    pub performer: String,
    pub grouping: String,
    pub comment: String,
    pub lyrics: String,

    // Numbers
    pub year: i32,
    pub originalyear: i32,
    pub track: i32,
    pub disc: i32,
    pub bitrate: i32,
    pub samplerate: i32,
    pub bitdepth: i32,
    pub length_nanosec: i64,

    pub compilation: bool,
    pub art_embedded: bool,

    /// 0.0 to 1.0, zero or below means unrated
    pub rating: f32,
    pub playcount: u32,

    // Identifiers, stored verbatim
    pub acoustid_id: String,
    pub acoustid_fingerprint: String,
    pub musicbrainz_album_artist_id: String,
    pub musicbrainz_artist_id: String,
    pub musicbrainz_original_artist_id: String,
    pub musicbrainz_album_id: String,
    pub musicbrainz_original_album_id: String,
    pub musicbrainz_recording_id: String,
    pub musicbrainz_track_id: String,
    pub musicbrainz_disc_id: String,
    pub musicbrainz_release_group_id: String,
    pub musicbrainz_work_id: String,
}

impl Default for SongMetadata {
    fn default() -> Self {
        Self {
            basefilename: String::new(),
            url: String::new(),
            filesize: 0,
            mtime: 0,
            ctime: 0,
            lastseen: 0,
            filetype: FileType::Unknown,
            valid: false,
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            albumartist: String::new(),
            genre: String::new(),
            composer: String::new(),
            performer: String::new(),
            grouping: String::new(),
            comment: String::new(),
            lyrics: String::new(),
            year: ABSENT,
            originalyear: ABSENT,
            track: ABSENT,
            disc: ABSENT,
            bitrate: ABSENT,
            samplerate: ABSENT,
            bitdepth: ABSENT,
            length_nanosec: 0,
            compilation: false,
            art_embedded: false,
            rating: 0.0,
            playcount: 0,
            acoustid_id: String::new(),
            acoustid_fingerprint: String::new(),
            musicbrainz_album_artist_id: String::new(),
            musicbrainz_artist_id: String::new(),
            musicbrainz_original_artist_id: String::new(),
            musicbrainz_album_id: String::new(),
            musicbrainz_original_album_id: String::new(),
            musicbrainz_recording_id: String::new(),
            musicbrainz_track_id: String::new(),
            musicbrainz_disc_id: String::new(),
            musicbrainz_release_group_id: String::new(),
            musicbrainz_work_id: String::new(),
        }
    }
}

impl SongMetadata {
    /// Collapse every non-positive numeric field to [`ABSENT`].
    pub fn normalize_numbers(&mut self) {
        for value in [
            &mut self.track,
            &mut self.disc,
            &mut self.year,
            &mut self.originalyear,
            &mut self.samplerate,
            &mut self.bitdepth,
            &mut self.bitrate,
        ] {
            if *value <= 0 {
                *value = ABSENT;
            }
        }
    }

    /// Whether a rating has been set.
    pub fn has_rating(&self) -> bool {
        self.rating > 0.0
    }

    /// Numeric field for writing: `None` when absent.
    pub fn positive(value: i32) -> Option<u32> {
        u32::try_from(value).ok().filter(|v| *v > 0)
    }
}
