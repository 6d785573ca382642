//! Test utilities and fixtures for tagbridge tests.
//!
//! Builds tiny but valid audio files in memory so pipeline tests can run
//! against real containers without checked-in media.
//!
//! # Example
//!
//! ```text
//! let (_dir, path) = write_fixture("tone.wav", &wav_bytes());
//! // Keep `_dir` alive for the duration of the test
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 8000;

/// Write `bytes` to `name` inside a fresh temporary directory.
///
/// The directory is deleted when the returned `TempDir` is dropped.
pub fn write_fixture(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    (dir, path)
}

/// A 16-bit mono PCM WAV file holding a tenth of a second of silence.
pub fn wav_bytes() -> Vec<u8> {
    let data_len: u32 = SAMPLE_RATE / 10 * 2;
    let mut out = Vec::new();

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes()); // byte rate
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

/// A FLAC stream (44.1 kHz, stereo, 16-bit) with STREAMINFO followed by a
/// trailing PADDING block, as encoders write it.
pub fn flac_bytes() -> Vec<u8> {
    let mut out = flac_stream(false);
    // Last-metadata-block flag set, type 1 (PADDING), length 64
    out.push(0x81);
    out.extend_from_slice(&[0x00, 0x00, 64]);
    out.resize(out.len() + 64, 0);
    out
}

/// A FLAC stream whose only metadata block is STREAMINFO.
pub fn flac_streaminfo_only_bytes() -> Vec<u8> {
    flac_stream(true)
}

fn flac_stream(streaminfo_last: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"fLaC");

    // Type 0 (STREAMINFO), length 34
    out.push(if streaminfo_last { 0x80 } else { 0x00 });
    out.extend_from_slice(&[0x00, 0x00, 34]);

    out.extend_from_slice(&4096u16.to_be_bytes()); // min block size
    out.extend_from_slice(&4096u16.to_be_bytes()); // max block size
    out.extend_from_slice(&[0, 0, 0]); // min frame size
    out.extend_from_slice(&[0, 0, 0]); // max frame size

    let sample_rate: u64 = 44_100;
    let channels_minus_one: u64 = 1;
    let bits_minus_one: u64 = 15;
    let total_samples: u64 = 44_100;
    let packed =
        (sample_rate << 44) | (channels_minus_one << 41) | (bits_minus_one << 36) | total_samples;
    out.extend_from_slice(&packed.to_be_bytes());

    out.extend_from_slice(&[0u8; 16]); // MD5
    out
}

/// Twenty silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz, stereo).
pub fn mp3_bytes() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut out = Vec::with_capacity(FRAME_LEN * 20);
    for _ in 0..20 {
        let start = out.len();
        out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        out.resize(start + FRAME_LEN, 0);
    }
    out
}

/// A 128-byte ID3v1 tag with only title and artist set.
pub fn id3v1_bytes(title: &str, artist: &str) -> Vec<u8> {
    fn field(out: &mut Vec<u8>, value: &str, len: usize) {
        let start = out.len();
        out.extend(value.bytes().take(len));
        out.resize(start + len, 0);
    }

    let mut out = b"TAG".to_vec();
    field(&mut out, title, 30);
    field(&mut out, artist, 30);
    field(&mut out, "", 30); // album
    field(&mut out, "", 4); // year
    field(&mut out, "", 30); // comment
    out.push(255); // no genre
    out
}

fn mp4_atom(name: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + content.len());
    out.extend_from_slice(&(8 + content.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(content);
    out
}

/// An M4A file with one sound track lasting one second and no tags.
pub fn mp4_bytes() -> Vec<u8> {
    let mut ftyp = b"M4A ".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"M4A isom");

    let mut mdhd = vec![0u8; 12]; // version, flags, creation and modification times
    mdhd.extend_from_slice(&44_100u32.to_be_bytes()); // timescale
    mdhd.extend_from_slice(&44_100u32.to_be_bytes()); // duration
    mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]); // language "und", quality

    let mut hdlr = vec![0u8; 8]; // version, flags, pre-defined
    hdlr.extend_from_slice(b"soun");
    hdlr.extend_from_slice(&[0u8; 12]);
    hdlr.push(0); // empty name

    let mut mdia = mp4_atom(b"mdhd", &mdhd);
    mdia.extend(mp4_atom(b"hdlr", &hdlr));
    let trak = mp4_atom(b"trak", &mp4_atom(b"mdia", &mdia));

    let mut out = mp4_atom(b"ftyp", &ftyp);
    out.extend(mp4_atom(b"moov", &trak));
    out.extend(mp4_atom(b"mdat", &[0u8; 64]));
    out
}

/// A one-block WavPack stream: one second of 16-bit stereo at 44.1 kHz.
pub fn wavpack_bytes() -> Vec<u8> {
    const SAMPLES: u32 = 44_100;
    // 16-bit, initial and final block, sample rate index 9 (44.1 kHz)
    const FLAGS: u32 = 1 | 0x800 | 0x1000 | (9 << 23);
    let payload = [0u8; 32];

    let mut out = b"wvpk".to_vec();
    out.extend_from_slice(&(24 + payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x410u16.to_le_bytes()); // stream version
    out.extend_from_slice(&[0, 0]); // track and index numbers
    out.extend_from_slice(&SAMPLES.to_le_bytes()); // total samples
    out.extend_from_slice(&0u32.to_le_bytes()); // block index
    out.extend_from_slice(&SAMPLES.to_le_bytes()); // samples in block
    out.extend_from_slice(&FLAGS.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // crc
    out.extend_from_slice(&payload);
    out
}

fn ogg_crc(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ 0x04C1_1DB7 } else { crc << 1 };
        }
    }
    crc
}

fn ogg_page(out: &mut Vec<u8>, header_type: u8, granule: u64, sequence: u32, packet: &[u8]) {
    let start = out.len();
    out.extend_from_slice(b"OggS");
    out.push(0); // version
    out.push(header_type);
    out.extend_from_slice(&granule.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // serial
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // crc, filled below

    let mut lacing = vec![255u8; packet.len() / 255];
    lacing.push((packet.len() % 255) as u8);
    out.push(lacing.len() as u8);
    out.extend_from_slice(&lacing);
    out.extend_from_slice(packet);

    let crc = ogg_crc(&out[start..]);
    out[start + 22..start + 26].copy_from_slice(&crc.to_le_bytes());
}

/// An Ogg Opus stream: stereo, one second after pre-skip, empty comments.
pub fn opus_bytes() -> Vec<u8> {
    const PRE_SKIP: u16 = 312;

    let mut head = b"OpusHead".to_vec();
    head.push(1); // version
    head.push(2); // channels
    head.extend_from_slice(&PRE_SKIP.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes()); // input sample rate
    head.extend_from_slice(&0u16.to_le_bytes()); // output gain
    head.push(0); // channel mapping family

    let vendor = b"tagbridge";
    let mut tags = b"OpusTags".to_vec();
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor);
    tags.extend_from_slice(&0u32.to_le_bytes()); // comment count

    let mut out = Vec::new();
    ogg_page(&mut out, 0x02, 0, 0, &head); // beginning of stream
    ogg_page(&mut out, 0x00, 0, 1, &tags);
    ogg_page(&mut out, 0x04, 48_000 + u64::from(PRE_SKIP), 2, &[0xFC; 40]); // end of stream
    out
}

/// Baseline JPEG headers (SOI, JFIF, SOF0 for a 1x1 image, EOI).
pub fn jpeg_bytes() -> Vec<u8> {
    vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00, // APP0
        0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x01, 0x00, 0x01, 0x03, 0x01, 0x22, 0x00, 0x02, 0x11,
        0x01, 0x03, 0x11, 0x01, // SOF0
        0xFF, 0xD9, // EOI
    ]
}

/// PNG signature and IHDR chunk for a 1x1 RGB image.
pub fn png_bytes() -> Vec<u8> {
    let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    out.extend_from_slice(&13u32.to_be_bytes());
    out.extend_from_slice(b"IHDR");
    out.extend_from_slice(&1u32.to_be_bytes()); // width
    out.extend_from_slice(&1u32.to_be_bytes()); // height
    out.extend_from_slice(&[8, 2, 0, 0, 0]); // depth, colour type, compression, filter, interlace
    out.extend_from_slice(&[0x90, 0x77, 0x53, 0xDE]); // CRC
    out
}

/// GIF89a header.
pub fn gif_bytes() -> Vec<u8> {
    b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec()
}

fn asf_object(out: &mut Vec<u8>, guid: [u8; 16], data: &[u8]) {
    out.extend_from_slice(&guid);
    out.extend_from_slice(&(24 + data.len() as u64).to_le_bytes());
    out.extend_from_slice(data);
}

/// An ASF file with File Properties, one WMA stream, an empty Header
/// Extension and a short data object. One second long after preroll.
pub fn asf_bytes() -> Vec<u8> {
    const HEADER: [u8; 16] = [
        0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
        0x6C,
    ];
    const FILE_PROPERTIES: [u8; 16] = [
        0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53,
        0x65,
    ];
    const STREAM_PROPERTIES: [u8; 16] = [
        0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53,
        0x65,
    ];
    const AUDIO_MEDIA: [u8; 16] = [
        0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44,
        0x2B,
    ];
    const HEADER_EXTENSION: [u8; 16] = [
        0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53,
        0x65,
    ];
    const DATA: [u8; 16] = [
        0x36, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
        0x6C,
    ];
    const PREROLL_MS: u64 = 3000;

    let mut file_properties = vec![0u8; 16]; // file id
    file_properties.extend_from_slice(&0u64.to_le_bytes()); // file size, patched below
    file_properties.extend_from_slice(&0u64.to_le_bytes()); // creation date
    file_properties.extend_from_slice(&1u64.to_le_bytes()); // data packets
    file_properties.extend_from_slice(&((1000 + PREROLL_MS) * 10_000).to_le_bytes()); // play duration
    file_properties.extend_from_slice(&((1000 + PREROLL_MS) * 10_000).to_le_bytes()); // send duration
    file_properties.extend_from_slice(&PREROLL_MS.to_le_bytes());
    file_properties.extend_from_slice(&2u32.to_le_bytes()); // flags: seekable
    file_properties.extend_from_slice(&64u32.to_le_bytes()); // min packet size
    file_properties.extend_from_slice(&64u32.to_le_bytes()); // max packet size
    file_properties.extend_from_slice(&128_000u32.to_le_bytes()); // max bitrate

    let mut wave_format = Vec::new();
    wave_format.extend_from_slice(&0x0161u16.to_le_bytes()); // WMA v2
    wave_format.extend_from_slice(&2u16.to_le_bytes());
    wave_format.extend_from_slice(&44_100u32.to_le_bytes());
    wave_format.extend_from_slice(&16_000u32.to_le_bytes()); // bytes per second
    wave_format.extend_from_slice(&64u16.to_le_bytes()); // block align
    wave_format.extend_from_slice(&16u16.to_le_bytes());
    wave_format.extend_from_slice(&0u16.to_le_bytes()); // extra size

    let mut stream_properties = AUDIO_MEDIA.to_vec();
    stream_properties.extend_from_slice(&[0u8; 16]); // error correction type
    stream_properties.extend_from_slice(&0u64.to_le_bytes()); // time offset
    stream_properties.extend_from_slice(&(wave_format.len() as u32).to_le_bytes());
    stream_properties.extend_from_slice(&0u32.to_le_bytes()); // error correction length
    stream_properties.extend_from_slice(&1u16.to_le_bytes()); // stream number
    stream_properties.extend_from_slice(&0u32.to_le_bytes()); // reserved
    stream_properties.extend_from_slice(&wave_format);

    let mut extension = vec![
        0x11, 0xD2, 0xD3, 0xAB, 0xBA, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53,
        0x65, 0x06, 0x00,
    ];
    extension.extend_from_slice(&0u32.to_le_bytes());

    let mut objects = Vec::new();
    asf_object(&mut objects, FILE_PROPERTIES, &file_properties);
    asf_object(&mut objects, STREAM_PROPERTIES, &stream_properties);
    asf_object(&mut objects, HEADER_EXTENSION, &extension);

    let mut data = vec![0u8; 16]; // file id
    data.extend_from_slice(&1u64.to_le_bytes()); // packet count
    data.extend_from_slice(&[0x01, 0x01]);
    data.extend_from_slice(&[0x5A; 64]); // one packet

    let header_len = 30 + objects.len() as u64;
    let mut out = Vec::new();
    out.extend_from_slice(&HEADER);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&[0x01, 0x02]);
    out.extend(objects);
    asf_object(&mut out, DATA, &data);

    let total = out.len() as u64;
    // Header object (30) + File Properties object header (24) + file id (16)
    out[70..78].copy_from_slice(&total.to_le_bytes());
    out
}
