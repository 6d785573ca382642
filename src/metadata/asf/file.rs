//! ASF header object reading and rewriting.
//!
//! Only the header object is parsed. The data and index objects behind it
//! are copied through untouched on save, with the File Properties size
//! field patched to the new total.
//!
//! Attributes live in the Extended Content Description object unless
//! their name or value exceeds its 16-bit length fields, in which case
//! they go to the Metadata Library object inside the Header Extension.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::{AsfAttribute, AsfTag};
use crate::metadata::replace_file;

type Guid = [u8; 16];

const HEADER: Guid = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const FILE_PROPERTIES: Guid = [
    0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const STREAM_PROPERTIES: Guid = [
    0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const AUDIO_MEDIA: Guid = [
    0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];
const CONTENT_DESCRIPTION: Guid = [
    0x33, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const EXTENDED_CONTENT_DESCRIPTION: Guid = [
    0x40, 0xA4, 0xD0, 0xD2, 0x07, 0xE3, 0xD2, 0x11, 0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50,
];
const HEADER_EXTENSION: Guid = [
    0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const METADATA_LIBRARY: Guid = [
    0x94, 0x1C, 0x23, 0x44, 0x98, 0x94, 0xD1, 0x49, 0xA1, 0x41, 0x1D, 0x13, 0x4E, 0x45, 0x70, 0x54,
];

/// Reserved GUID and word that open every Header Extension payload.
const EXTENSION_RESERVED: [u8; 18] = [
    0x11, 0xD2, 0xD3, 0xAB, 0xBA, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
    0x06, 0x00,
];

const HEADER_OBJECT_LEN: usize = 30;
const OBJECT_HEADER_LEN: usize = 24;

const TYPE_UNICODE: u16 = 0;
const TYPE_BYTES: u16 = 1;
const TYPE_BOOL: u16 = 2;
const TYPE_DWORD: u16 = 3;
const TYPE_QWORD: u16 = 4;
const TYPE_WORD: u16 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AsfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Not an ASF file")]
    NotAsf,

    #[error("Malformed ASF header: {0}")]
    Malformed(&'static str),

    #[error("Value too large for ASF: {0}")]
    TooLarge(&'static str),
}

pub type AsfResult<T> = std::result::Result<T, AsfError>;

/// Stream properties of the first audio stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsfProperties {
    pub duration: Duration,
    /// kbps
    pub overall_bitrate: Option<u32>,
    /// kbps
    pub audio_bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
    pub channels: Option<u8>,
}

/// A Metadata Library record that does not belong to the file-level tag.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LibraryRecord {
    language: u16,
    stream: u16,
    name: String,
    kind: u16,
    data: Vec<u8>,
}

/// Header objects in file order. Tag-bearing objects are placeholders
/// regenerated from the tag on save.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderSlot {
    Raw { guid: Guid, data: Vec<u8> },
    ContentDescription,
    ExtendedContentDescription,
    Extension { objects: Vec<(Guid, Vec<u8>)> },
}

/// A parsed ASF (WMA) file header.
#[derive(Debug, Clone)]
pub struct AsfFile {
    tag: AsfTag,
    properties: AsfProperties,
    /// Fifth Content Description string, kept as found
    content_rating: String,
    library_extra: Vec<LibraryRecord>,
    slots: Vec<HeaderSlot>,
    reserved: [u8; 2],
}

impl AsfFile {
    /// Whether the file starts with the ASF header GUID.
    pub fn sniff(path: &Path) -> io::Result<bool> {
        let mut guid = [0u8; 16];
        let mut file = File::open(path)?;
        match file.read_exact(&mut guid) {
            Ok(()) => Ok(guid == HEADER),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn read_from<R: Read + Seek>(reader: &mut R) -> AsfResult<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut head = [0u8; HEADER_OBJECT_LEN];
        reader.read_exact(&mut head)?;
        let mut bytes = Bytes::new(&head);
        if bytes.guid()? != HEADER {
            return Err(AsfError::NotAsf);
        }
        let size = bytes.u64()?;
        let count = bytes.u32()?;
        let reserved = bytes.array::<2>()?;

        if size > file_len || size < HEADER_OBJECT_LEN as u64 {
            return Err(AsfError::Malformed("header size"));
        }
        let body_len = usize::try_from(size)
            .map_err(|_| AsfError::Malformed("header size"))?
            - HEADER_OBJECT_LEN;
        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body)?;

        let mut file = Self {
            tag: AsfTag::new(),
            properties: AsfProperties::default(),
            content_rating: String::new(),
            library_extra: Vec::new(),
            slots: Vec::new(),
            reserved,
        };

        let mut bytes = Bytes::new(&body);
        for _ in 0..count {
            let (guid, data) = bytes.object()?;
            let slot = file.parse_object(guid, data)?;
            file.slots.push(slot);
        }

        if !file.slots.contains(&HeaderSlot::ContentDescription) {
            file.slots.push(HeaderSlot::ContentDescription);
        }
        if !file.slots.contains(&HeaderSlot::ExtendedContentDescription) {
            file.slots.push(HeaderSlot::ExtendedContentDescription);
        }
        Ok(file)
    }

    pub fn tag(&self) -> &AsfTag {
        &self.tag
    }

    pub fn tag_mut(&mut self) -> &mut AsfTag {
        &mut self.tag
    }

    pub fn properties(&self) -> &AsfProperties {
        &self.properties
    }

    /// Rewrite the header, keeping every byte after it.
    ///
    /// The new file is written next to the original and renamed over it,
    /// so a failed write leaves the original untouched.
    pub fn save_to_path(&self, path: &Path) -> AsfResult<()> {
        let original = fs::read(path)?;
        let mut head = Bytes::new(&original);
        if head.guid()? != HEADER {
            return Err(AsfError::NotAsf);
        }
        let old_size =
            usize::try_from(head.u64()?).map_err(|_| AsfError::Malformed("header size"))?;
        let payload = original
            .get(old_size..)
            .ok_or(AsfError::Malformed("header size"))?;

        let (extended, library) = self.split_attributes();
        let mut objects: Vec<(Guid, Vec<u8>)> = Vec::with_capacity(self.slots.len() + 1);
        let mut has_extension = false;
        for slot in &self.slots {
            match slot {
                HeaderSlot::Raw { guid, data } => objects.push((*guid, data.clone())),
                HeaderSlot::ContentDescription => {
                    if let Some(data) = self.encode_content_description() {
                        objects.push((CONTENT_DESCRIPTION, data));
                    }
                }
                HeaderSlot::ExtendedContentDescription => {
                    if !extended.is_empty() {
                        objects.push((EXTENDED_CONTENT_DESCRIPTION, encode_extended(&extended)));
                    }
                }
                HeaderSlot::Extension { objects: inner } => {
                    has_extension = true;
                    objects.push((HEADER_EXTENSION, encode_extension(inner, &library)?));
                }
            }
        }
        if !has_extension && !library.is_empty() {
            objects.push((HEADER_EXTENSION, encode_extension(&[], &library)?));
        }

        let header_len = HEADER_OBJECT_LEN
            + objects
                .iter()
                .map(|(_, data)| OBJECT_HEADER_LEN + data.len())
                .sum::<usize>();
        let total = (header_len + payload.len()) as u64;
        let count =
            u32::try_from(objects.len()).map_err(|_| AsfError::Malformed("object count"))?;

        let mut out = Vec::with_capacity(header_len + payload.len());
        out.extend_from_slice(&HEADER);
        out.extend_from_slice(&(header_len as u64).to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&self.reserved);
        for (guid, mut data) in objects {
            if guid == FILE_PROPERTIES && data.len() >= 24 {
                data[16..24].copy_from_slice(&total.to_le_bytes());
            }
            write_object(&mut out, &guid, &data);
        }
        out.extend_from_slice(payload);

        replace_file(path, &out)?;
        Ok(())
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    fn parse_object(&mut self, guid: Guid, data: &[u8]) -> AsfResult<HeaderSlot> {
        match guid {
            CONTENT_DESCRIPTION => {
                self.read_content_description(data)?;
                Ok(HeaderSlot::ContentDescription)
            }
            EXTENDED_CONTENT_DESCRIPTION => {
                self.read_extended(data)?;
                Ok(HeaderSlot::ExtendedContentDescription)
            }
            HEADER_EXTENSION => self.read_extension(data),
            FILE_PROPERTIES => {
                self.read_file_properties(data)?;
                Ok(HeaderSlot::Raw { guid, data: data.to_vec() })
            }
            STREAM_PROPERTIES => {
                self.read_stream_properties(data)?;
                Ok(HeaderSlot::Raw { guid, data: data.to_vec() })
            }
            _ => Ok(HeaderSlot::Raw { guid, data: data.to_vec() }),
        }
    }

    fn read_content_description(&mut self, data: &[u8]) -> AsfResult<()> {
        let mut bytes = Bytes::new(data);
        let mut lengths = [0u16; 5];
        for len in &mut lengths {
            *len = bytes.u16()?;
        }
        let [title, author, copyright, description, rating] = lengths;
        self.tag.title = decode_utf16(bytes.take(title.into())?);
        self.tag.author = decode_utf16(bytes.take(author.into())?);
        self.tag.copyright = decode_utf16(bytes.take(copyright.into())?);
        self.tag.description = decode_utf16(bytes.take(description.into())?);
        self.content_rating = decode_utf16(bytes.take(rating.into())?);
        Ok(())
    }

    fn read_extended(&mut self, data: &[u8]) -> AsfResult<()> {
        let mut bytes = Bytes::new(data);
        let count = bytes.u16()?;
        for _ in 0..count {
            let name_len = bytes.u16()?;
            let name = decode_utf16(bytes.take(name_len.into())?);
            let kind = bytes.u16()?;
            let value_len = bytes.u16()?;
            let raw = bytes.take(value_len.into())?;
            match decode_value(kind, raw) {
                Some(value) => self.tag.add_attribute(&name, value),
                None => warn!(target: "metadata::asf", name = %name, kind, "Skipping attribute of unknown type"),
            }
        }
        Ok(())
    }

    fn read_extension(&mut self, data: &[u8]) -> AsfResult<HeaderSlot> {
        let mut bytes = Bytes::new(data);
        bytes.take(EXTENSION_RESERVED.len())?;
        let size = bytes.u32()?;
        let inner_len = usize::try_from(size).map_err(|_| AsfError::Malformed("extension size"))?;
        let mut inner = Bytes::new(bytes.take(inner_len)?);

        let mut objects = Vec::new();
        while inner.remaining() >= OBJECT_HEADER_LEN {
            let (guid, data) = inner.object()?;
            if guid == METADATA_LIBRARY {
                self.read_library(data)?;
            } else {
                objects.push((guid, data.to_vec()));
            }
        }
        Ok(HeaderSlot::Extension { objects })
    }

    fn read_library(&mut self, data: &[u8]) -> AsfResult<()> {
        let mut bytes = Bytes::new(data);
        let count = bytes.u16()?;
        for _ in 0..count {
            let language = bytes.u16()?;
            let stream = bytes.u16()?;
            let name_len = bytes.u16()?;
            let kind = bytes.u16()?;
            let data_len =
                usize::try_from(bytes.u32()?).map_err(|_| AsfError::Malformed("record size"))?;
            let name = decode_utf16(bytes.take(name_len.into())?);
            let raw = bytes.take(data_len)?;

            let value = (language == 0 && stream == 0)
                .then(|| decode_value(kind, raw))
                .flatten();
            match value {
                Some(value) => self.tag.add_attribute(&name, value),
                None => self.library_extra.push(LibraryRecord {
                    language,
                    stream,
                    name,
                    kind,
                    data: raw.to_vec(),
                }),
            }
        }
        Ok(())
    }

    fn read_file_properties(&mut self, data: &[u8]) -> AsfResult<()> {
        let mut bytes = Bytes::new(data);
        // File ID, file size, creation date, packet count
        bytes.take(40)?;
        let play_duration = bytes.u64()?;
        bytes.take(8)?;
        let preroll_ms = bytes.u64()?;
        // Flags, packet sizes
        bytes.take(12)?;
        let max_bitrate = bytes.u32()?;

        self.properties.duration = Duration::from_nanos(play_duration.saturating_mul(100))
            .saturating_sub(Duration::from_millis(preroll_ms));
        self.properties.overall_bitrate = Some(max_bitrate / 1000).filter(|b| *b > 0);
        Ok(())
    }

    fn read_stream_properties(&mut self, data: &[u8]) -> AsfResult<()> {
        if self.properties.sample_rate.is_some() {
            return Ok(());
        }
        let mut bytes = Bytes::new(data);
        if bytes.guid()? != AUDIO_MEDIA {
            return Ok(());
        }
        // Error correction type, time offset, lengths, flags, reserved
        bytes.take(16 + 8 + 4 + 4 + 2 + 4)?;

        // WAVEFORMATEX
        let _format_tag = bytes.u16()?;
        let channels = bytes.u16()?;
        let sample_rate = bytes.u32()?;
        let avg_bytes_per_sec = bytes.u32()?;
        let _block_align = bytes.u16()?;
        let bits_per_sample = bytes.u16()?;

        self.properties.channels = u8::try_from(channels).ok().filter(|c| *c > 0);
        self.properties.sample_rate = Some(sample_rate).filter(|r| *r > 0);
        self.properties.audio_bitrate =
            Some((u64::from(avg_bytes_per_sec) * 8 / 1000) as u32).filter(|b| *b > 0);
        self.properties.bit_depth = u8::try_from(bits_per_sample).ok().filter(|b| *b > 0);
        Ok(())
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    fn encode_content_description(&self) -> Option<Vec<u8>> {
        let fields = [
            &self.tag.title,
            &self.tag.author,
            &self.tag.copyright,
            &self.tag.description,
            &self.content_rating,
        ];
        if fields.iter().all(|f| f.is_empty()) {
            return None;
        }

        let encoded: Vec<Vec<u8>> = fields
            .iter()
            .map(|f| {
                let mut bytes = if f.is_empty() { Vec::new() } else { encode_utf16(f) };
                if bytes.len() > usize::from(u16::MAX) {
                    warn!(target: "metadata::asf", "Content description field too long, truncating");
                    bytes.truncate(usize::from(u16::MAX) - 3);
                    bytes.extend_from_slice(&[0, 0]);
                }
                bytes
            })
            .collect();

        let mut out = Vec::new();
        for field in &encoded {
            out.extend_from_slice(&(field.len() as u16).to_le_bytes());
        }
        for field in encoded {
            out.extend(field);
        }
        Some(out)
    }

    /// Partition attributes by whether they fit the 16-bit length fields
    /// of the Extended Content Description object.
    fn split_attributes(&self) -> (Vec<(&str, &AsfAttribute)>, Vec<LibraryRecord>) {
        let mut extended = Vec::new();
        let mut library = self.library_extra.clone();
        for (name, value) in self.tag.attributes() {
            let (kind, data) = encode_value(value, 4);
            let fits = encode_utf16(name).len() <= usize::from(u16::MAX)
                && data.len() <= usize::from(u16::MAX)
                && extended.len() < usize::from(u16::MAX);
            if fits {
                extended.push((name, value));
            } else {
                let (kind, data) = match kind {
                    TYPE_BOOL => encode_value(value, 2),
                    _ => (kind, data),
                };
                library.push(LibraryRecord {
                    language: 0,
                    stream: 0,
                    name: name.to_string(),
                    kind,
                    data,
                });
            }
        }
        (extended, library)
    }
}

fn encode_extended(attributes: &[(&str, &AsfAttribute)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(attributes.len() as u16).to_le_bytes());
    for (name, value) in attributes {
        let name = encode_utf16(name);
        let (kind, data) = encode_value(value, 4);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(&data);
    }
    out
}

fn encode_extension(objects: &[(Guid, Vec<u8>)], library: &[LibraryRecord]) -> AsfResult<Vec<u8>> {
    let mut inner = Vec::new();
    for (guid, data) in objects {
        write_object(&mut inner, guid, data);
    }
    if !library.is_empty() {
        let count =
            u16::try_from(library.len()).map_err(|_| AsfError::Malformed("too many attributes"))?;
        let mut data = Vec::new();
        data.extend_from_slice(&count.to_le_bytes());
        for record in library {
            let name = encode_utf16(&record.name);
            let name_len =
                u16::try_from(name.len()).map_err(|_| AsfError::Malformed("attribute name"))?;
            let data_len = u32::try_from(record.data.len())
                .map_err(|_| AsfError::Malformed("attribute value"))?;
            data.extend_from_slice(&record.language.to_le_bytes());
            data.extend_from_slice(&record.stream.to_le_bytes());
            data.extend_from_slice(&name_len.to_le_bytes());
            data.extend_from_slice(&record.kind.to_le_bytes());
            data.extend_from_slice(&data_len.to_le_bytes());
            data.extend_from_slice(&name);
            data.extend_from_slice(&record.data);
        }
        write_object(&mut inner, &METADATA_LIBRARY, &data);
    }

    let size = u32::try_from(inner.len()).map_err(|_| AsfError::Malformed("extension size"))?;
    let mut out = Vec::with_capacity(EXTENSION_RESERVED.len() + 4 + inner.len());
    out.extend_from_slice(&EXTENSION_RESERVED);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend(inner);
    Ok(out)
}

fn write_object(out: &mut Vec<u8>, guid: &Guid, data: &[u8]) {
    out.extend_from_slice(guid);
    out.extend_from_slice(&((OBJECT_HEADER_LEN + data.len()) as u64).to_le_bytes());
    out.extend_from_slice(data);
}

/// Decode a typed value. BOOL is 4 bytes in the Extended Content
/// Description object and 2 in the Metadata Library; any non-zero byte
/// counts as true.
fn decode_value(kind: u16, raw: &[u8]) -> Option<AsfAttribute> {
    match kind {
        TYPE_UNICODE => Some(AsfAttribute::Text(decode_utf16(raw))),
        TYPE_BYTES => Some(AsfAttribute::Bytes(raw.to_vec())),
        TYPE_BOOL => Some(AsfAttribute::Bool(raw.iter().any(|b| *b != 0))),
        TYPE_DWORD => le_array::<4>(raw).map(|b| AsfAttribute::DWord(u32::from_le_bytes(b))),
        TYPE_QWORD => le_array::<8>(raw).map(|b| AsfAttribute::QWord(u64::from_le_bytes(b))),
        TYPE_WORD => le_array::<2>(raw).map(|b| AsfAttribute::Word(u16::from_le_bytes(b))),
        _ => None,
    }
}

fn encode_value(value: &AsfAttribute, bool_len: usize) -> (u16, Vec<u8>) {
    match value {
        AsfAttribute::Text(text) => (TYPE_UNICODE, encode_utf16(text)),
        AsfAttribute::Bytes(data) => (TYPE_BYTES, data.clone()),
        AsfAttribute::Bool(flag) => {
            let mut data = vec![0u8; bool_len];
            data[0] = u8::from(*flag);
            (TYPE_BOOL, data)
        }
        AsfAttribute::Word(n) => (TYPE_WORD, n.to_le_bytes().to_vec()),
        AsfAttribute::DWord(n) => (TYPE_DWORD, n.to_le_bytes().to_vec()),
        AsfAttribute::QWord(n) => (TYPE_QWORD, n.to_le_bytes().to_vec()),
    }
}

fn le_array<const N: usize>(raw: &[u8]) -> Option<[u8; N]> {
    raw.get(..N).and_then(|b| b.try_into().ok())
}

fn decode_utf16(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// UTF-16LE with a terminating NUL.
fn encode_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Little-endian cursor over a byte slice.
struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Bytes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> AsfResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(AsfError::Malformed("truncated object"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> AsfResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn guid(&mut self) -> AsfResult<Guid> {
        self.array::<16>()
    }

    fn u16(&mut self) -> AsfResult<u16> {
        self.array::<2>().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> AsfResult<u32> {
        self.array::<4>().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> AsfResult<u64> {
        self.array::<8>().map(u64::from_le_bytes)
    }

    /// One object: GUID, 64-bit size including the 24-byte header, payload.
    fn object(&mut self) -> AsfResult<(Guid, &'a [u8])> {
        let guid = self.guid()?;
        let size = self.u64()?;
        let len = usize::try_from(size)
            .ok()
            .and_then(|size| size.checked_sub(OBJECT_HEADER_LEN))
            .ok_or(AsfError::Malformed("object size"))?;
        Ok((guid, self.take(len)?))
    }
}
