//! Bounded reader for TIFF-structured IFD trees.
//!
//! The same structure lives inside a JPEG APP1 segment, a PNG `eXIf` chunk, a
//! WebP `EXIF` chunk, and is the whole of a TIFF file. Every offset is checked
//! against the buffer before it is followed, and every IFD offset may be
//! visited once, so a crafted chain can neither read out of bounds nor loop.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::tags::{IfdKind, RawTag, TagId, TagValue};

/// Largest entry count accepted for a single IFD.
pub const MAX_IFD_ENTRIES: usize = 4096;

/// Longest next-IFD chain followed when counting TIFF pages.
pub const MAX_PAGES: usize = 1024;

/// Byte order of a TIFF stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Read the byte-order mark and magic number at the start of a TIFF header.
    pub fn from_header(data: &[u8]) -> Option<Self> {
        match data.get(..4)? {
            [0x49, 0x49, 0x2A, 0x00] => Some(ByteOrder::Little),
            [0x4D, 0x4D, 0x00, 0x2A] => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn marker(&self) -> [u8; 2] {
        match self {
            ByteOrder::Little => *b"II",
            ByteOrder::Big => *b"MM",
        }
    }

    pub fn u16(&self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32(&self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    pub fn put_u16(&self, out: &mut Vec<u8>, value: u16) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn put_u32(&self, out: &mut Vec<u8>, value: u32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

/// TIFF field types.
pub mod field {
    pub const BYTE: u16 = 1;
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const RATIONAL: u16 = 5;
    pub const SBYTE: u16 = 6;
    pub const UNDEFINED: u16 = 7;
    pub const SSHORT: u16 = 8;
    pub const SLONG: u16 = 9;
    pub const SRATIONAL: u16 = 10;
    pub const FLOAT: u16 = 11;
    pub const DOUBLE: u16 = 12;
    pub const IFD: u16 = 13;
}

/// Tags that point at other IFDs rather than carrying a value.
pub mod pointer {
    pub const EXIF: u16 = 0x8769;
    pub const GPS: u16 = 0x8825;
    pub const INTEROP: u16 = 0xA005;
}

/// Size in bytes of one value of the given field type.
pub fn type_size(field_type: u16) -> Option<usize> {
    match field_type {
        field::BYTE | field::ASCII | field::SBYTE | field::UNDEFINED => Some(1),
        field::SHORT | field::SSHORT => Some(2),
        field::LONG | field::SLONG | field::FLOAT | field::IFD => Some(4),
        field::RATIONAL | field::SRATIONAL | field::DOUBLE => Some(8),
        _ => None,
    }
}

/// One IFD entry with its value bytes resolved (inline or via offset), still
/// in the byte order of the stream it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub code: u16,
    pub field_type: u16,
    pub count: u32,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn ascii(code: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            code,
            field_type: field::ASCII,
            count: data.len() as u32,
            data,
        }
    }

    pub fn short(code: u16, values: &[u16], order: ByteOrder) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            order.put_u16(&mut data, *v);
        }
        Self {
            code,
            field_type: field::SHORT,
            count: values.len() as u32,
            data,
        }
    }

    pub fn long(code: u16, values: &[u32], order: ByteOrder) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            order.put_u32(&mut data, *v);
        }
        Self {
            code,
            field_type: field::LONG,
            count: values.len() as u32,
            data,
        }
    }

    pub fn rational(code: u16, values: &[(u32, u32)], order: ByteOrder) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for (n, d) in values {
            order.put_u32(&mut data, *n);
            order.put_u32(&mut data, *d);
        }
        Self {
            code,
            field_type: field::RATIONAL,
            count: values.len() as u32,
            data,
        }
    }

    /// Integer values of a BYTE/SHORT/LONG/IFD entry.
    pub fn unsigned(&self, order: ByteOrder) -> Option<Vec<u32>> {
        match self.field_type {
            field::BYTE => Some(self.data.iter().map(|&b| b as u32).collect()),
            field::SHORT => Some(
                self.data
                    .chunks_exact(2)
                    .map(|c| order.u16([c[0], c[1]]) as u32)
                    .collect(),
            ),
            field::LONG | field::IFD => Some(
                self.data
                    .chunks_exact(4)
                    .map(|c| order.u32([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn first_unsigned(&self, order: ByteOrder) -> Option<u32> {
        self.unsigned(order)?.first().copied()
    }

    /// Decode the value for reporting and classification.
    pub fn decode(&self, order: ByteOrder) -> TagValue {
        let u32_at = |c: &[u8]| order.u32([c[0], c[1], c[2], c[3]]);

        if (0x9C9B..=0x9C9F).contains(&self.code)
            && matches!(self.field_type, field::BYTE | field::UNDEFINED)
        {
            return TagValue::Text(decode_utf16le(&self.data));
        }
        if self.code == 0x9286 && self.field_type == field::UNDEFINED {
            if let Some(text) = decode_user_comment(&self.data) {
                return TagValue::Text(text);
            }
        }

        match self.field_type {
            field::ASCII => TagValue::Text(decode_ascii(&self.data)),
            field::BYTE | field::SHORT | field::LONG | field::IFD => {
                TagValue::Unsigned(self.unsigned(order).unwrap_or_default())
            }
            field::SBYTE => TagValue::Signed(self.data.iter().map(|&b| b as i8 as i32).collect()),
            field::SSHORT => TagValue::Signed(
                self.data
                    .chunks_exact(2)
                    .map(|c| order.u16([c[0], c[1]]) as i16 as i32)
                    .collect(),
            ),
            field::SLONG => TagValue::Signed(self.data.chunks_exact(4).map(|c| u32_at(c) as i32).collect()),
            field::RATIONAL => TagValue::Rational(
                self.data
                    .chunks_exact(8)
                    .map(|c| (u32_at(&c[..4]), u32_at(&c[4..])))
                    .collect(),
            ),
            field::SRATIONAL => TagValue::SignedRational(
                self.data
                    .chunks_exact(8)
                    .map(|c| (u32_at(&c[..4]) as i32, u32_at(&c[4..]) as i32))
                    .collect(),
            ),
            field::FLOAT => TagValue::Float(
                self.data
                    .chunks_exact(4)
                    .map(|c| f32::from_bits(u32_at(c)) as f64)
                    .collect(),
            ),
            field::DOUBLE => TagValue::Float(
                self.data
                    .chunks_exact(8)
                    .map(|c| {
                        let (hi, lo) = match order {
                            ByteOrder::Little => (u32_at(&c[4..]), u32_at(&c[..4])),
                            ByteOrder::Big => (u32_at(&c[..4]), u32_at(&c[4..])),
                        };
                        f64::from_bits(((hi as u64) << 32) | lo as u64)
                    })
                    .collect(),
            ),
            _ if is_printable(&self.data) => TagValue::Text(decode_ascii(&self.data)),
            _ => TagValue::Bytes(self.data.clone()),
        }
    }
}

fn decode_ascii(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

fn decode_utf16le(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn decode_user_comment(data: &[u8]) -> Option<String> {
    let (charset, body) = (data.get(..8)?, &data[8..]);
    match charset {
        b"ASCII\0\0\0" => Some(decode_ascii(body)),
        b"UNICODE\0" => Some(decode_utf16le(body)),
        _ => None,
    }
}

fn is_printable(data: &[u8]) -> bool {
    let trimmed = match data.iter().position(|&b| b == 0) {
        Some(end) => &data[..end],
        None => data,
    };
    !trimmed.is_empty() && trimmed.len() <= 64 && trimmed.iter().all(|b| (0x20..0x7F).contains(b))
}

/// A parsed IFD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ifd {
    pub offset: u32,
    pub entries: Vec<Entry>,
    /// Offset of the next IFD in the chain, zero at the end.
    pub next: u32,
}

impl Ifd {
    pub fn get(&self, code: u16) -> Option<&Entry> {
        self.entries.iter().find(|e| e.code == code)
    }
}

/// An EXIF tree: IFD0 plus the sub-IFDs it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifTree {
    pub order: ByteOrder,
    pub ifd0: Ifd,
    pub exif: Option<Ifd>,
    pub gps: Option<Ifd>,
    pub interop: Option<Ifd>,
    /// IFDs after IFD0 in the next-IFD chain. Only filled for TIFF files.
    pub pages: Vec<Ifd>,
}

impl ExifTree {
    /// Number of top-level images (IFD0 plus chained pages).
    pub fn page_count(&self) -> usize {
        1 + self.pages.len()
    }

    /// All value-carrying entries tagged with the directory they came from.
    /// Pointer entries are structure and are not reported.
    pub fn raw_tags(&self) -> Vec<RawTag> {
        let dirs = [
            (IfdKind::Primary, Some(&self.ifd0)),
            (IfdKind::Exif, self.exif.as_ref()),
            (IfdKind::Gps, self.gps.as_ref()),
            (IfdKind::Interop, self.interop.as_ref()),
        ];

        let mut out = Vec::new();
        for (kind, ifd) in dirs {
            let Some(ifd) = ifd else { continue };
            for entry in &ifd.entries {
                if matches!(entry.code, pointer::EXIF | pointer::GPS | pointer::INTEROP) {
                    continue;
                }
                out.push(RawTag::new(
                    TagId::exif(kind, entry.code),
                    entry.data.clone(),
                    entry.decode(self.order),
                ));
            }
        }
        out
    }
}

/// Parse a TIFF-structured byte stream.
///
/// `format` names the container the stream came from, for error reporting.
/// With `follow_pages` the next-IFD chain after IFD0 is walked as well, which
/// only makes sense for standalone TIFF files: inside an EXIF block IFD1 is a
/// thumbnail and is ignored.
pub fn parse(data: &[u8], format: ImageFormat, follow_pages: bool) -> Result<ExifTree> {
    let order = ByteOrder::from_header(data)
        .ok_or_else(|| Error::malformed(format, "missing TIFF byte-order header"))?;

    let mut reader = IfdReader {
        data,
        order,
        format,
        visited: HashSet::new(),
    };

    let first = reader.read_u32(4)?;
    let ifd0 = reader.ifd(first)?;

    let exif = reader.sub_ifd(&ifd0, pointer::EXIF)?;
    let gps = reader.sub_ifd(&ifd0, pointer::GPS)?;
    let interop = match &exif {
        Some(exif) => reader.sub_ifd(exif, pointer::INTEROP)?,
        None => None,
    };

    let mut pages = Vec::new();
    if follow_pages {
        let mut next = ifd0.next;
        while next != 0 {
            if pages.len() + 1 >= MAX_PAGES {
                return Err(Error::malformed(format, "IFD chain exceeds page limit"));
            }
            let page = reader.ifd(next)?;
            next = page.next;
            pages.push(page);
        }
    }

    log::debug!(
        "{format} IFD tree: {} primary entries, exif={}, gps={}, pages={}",
        ifd0.entries.len(),
        exif.is_some(),
        gps.is_some(),
        1 + pages.len()
    );

    Ok(ExifTree {
        order,
        ifd0,
        exif,
        gps,
        interop,
        pages,
    })
}

struct IfdReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
    format: ImageFormat,
    visited: HashSet<u32>,
}

impl IfdReader<'_> {
    fn bytes(&self, pos: usize, len: usize) -> Result<&[u8]> {
        pos.checked_add(len)
            .and_then(|end| self.data.get(pos..end))
            .ok_or_else(|| Error::malformed(self.format, format!("offset {pos}+{len} outside buffer")))
    }

    fn read_u16(&self, pos: usize) -> Result<u16> {
        let b = self.bytes(pos, 2)?;
        Ok(self.order.u16([b[0], b[1]]))
    }

    fn read_u32(&self, pos: usize) -> Result<u32> {
        let b = self.bytes(pos, 4)?;
        Ok(self.order.u32([b[0], b[1], b[2], b[3]]))
    }

    fn sub_ifd(&mut self, parent: &Ifd, code: u16) -> Result<Option<Ifd>> {
        let Some(entry) = parent.get(code) else {
            return Ok(None);
        };
        let offset = entry
            .first_unsigned(self.order)
            .ok_or_else(|| Error::malformed(self.format, format!("IFD pointer {code:#06x} has no offset")))?;
        self.ifd(offset).map(Some)
    }

    fn ifd(&mut self, offset: u32) -> Result<Ifd> {
        if !self.visited.insert(offset) {
            return Err(Error::malformed(self.format, format!("IFD at {offset} visited twice")));
        }

        let start = offset as usize;
        let count = self.read_u16(start)? as usize;
        if count > MAX_IFD_ENTRIES {
            return Err(Error::malformed(self.format, format!("IFD declares {count} entries")));
        }

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let pos = start + 2 + i * 12;
            let head = self.bytes(pos, 12)?;
            let code = self.order.u16([head[0], head[1]]);
            let field_type = self.order.u16([head[2], head[3]]);
            let value_count = self.order.u32([head[4], head[5], head[6], head[7]]);

            let Some(size) = type_size(field_type) else {
                log::debug!("skipping tag {code:#06x} with unknown field type {field_type}");
                continue;
            };
            let len = size
                .checked_mul(value_count as usize)
                .ok_or_else(|| Error::malformed(self.format, format!("tag {code:#06x} count overflows")))?;

            let data = if len <= 4 {
                head[8..8 + len].to_vec()
            } else {
                let value_offset = self.order.u32([head[8], head[9], head[10], head[11]]);
                self.bytes(value_offset as usize, len)?.to_vec()
            };

            entries.push(Entry {
                code,
                field_type,
                count: value_count,
                data,
            });
        }

        // Some writers end the last IFD without a next pointer.
        let next_pos = start + 2 + count * 12;
        let next = if next_pos + 4 <= self.data.len() {
            self.read_u32(next_pos)?
        } else {
            0
        };

        Ok(Ifd {
            offset,
            entries,
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::writer::{TiffBuilder, encode_exif};

    fn tiff_le(entries: &[(u16, u16, u32, [u8; 4])], next: u32) -> Vec<u8> {
        let mut out = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (code, ty, count, value) in entries {
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(value);
        }
        out.extend_from_slice(&next.to_le_bytes());
        out
    }

    // ── happy path ──

    #[test]
    fn parses_inline_short() {
        let data = tiff_le(&[(0x0112, field::SHORT, 1, [6, 0, 0, 0])], 0);
        let tree = parse(&data, ImageFormat::Jpeg, false).unwrap();
        let entry = tree.ifd0.get(0x0112).unwrap();
        assert_eq!(entry.first_unsigned(ByteOrder::Little), Some(6));
        assert_eq!(tree.page_count(), 1);
    }

    #[test]
    fn parses_builder_output_with_sub_ifds() {
        let mut builder = TiffBuilder::new(ByteOrder::Big);
        builder.ifd0.push(Entry::ascii(0x010F, "Canon"));
        builder.exif.push(Entry::ascii(0x9003, "2024:05:01 10:00:00"));
        builder.gps.push(Entry::ascii(0x0001, "N"));
        let data = encode_exif(&builder);

        let tree = parse(&data, ImageFormat::Tiff, false).unwrap();
        assert_eq!(tree.order, ByteOrder::Big);
        assert!(tree.exif.is_some());
        assert!(tree.gps.is_some());

        let tags = tree.raw_tags();
        assert!(tags.iter().any(|t| t.id == TagId::exif(IfdKind::Exif, 0x9003)));
        assert!(!tags.iter().any(|t| t.id == TagId::exif(IfdKind::Primary, pointer::EXIF)));
    }

    #[test]
    fn decodes_values() {
        let order = ByteOrder::Little;
        let ascii = Entry::ascii(0x010F, "Nikon");
        assert_eq!(ascii.decode(order), TagValue::Text("Nikon".into()));

        let mut rational = Vec::new();
        order.put_u32(&mut rational, 1);
        order.put_u32(&mut rational, 250);
        let entry = Entry {
            code: 0x829A,
            field_type: field::RATIONAL,
            count: 1,
            data: rational,
        };
        assert_eq!(entry.decode(order), TagValue::Rational(vec![(1, 250)]));

        let xp = Entry {
            code: 0x9C9D,
            field_type: field::BYTE,
            count: 6,
            data: vec![b'A', 0, b'B', 0, 0, 0],
        };
        assert_eq!(xp.decode(order), TagValue::Text("AB".into()));
    }

    // ── bounds ──

    #[test]
    fn rejects_missing_header() {
        let err = parse(b"not a tiff", ImageFormat::Png, false).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer { format: ImageFormat::Png, .. }));
    }

    #[test]
    fn rejects_ifd_offset_outside_buffer() {
        let data = b"II\x2A\x00\xFF\x00\x00\x00".to_vec();
        assert!(parse(&data, ImageFormat::Tiff, false).is_err());
    }

    #[test]
    fn rejects_value_offset_outside_buffer() {
        // ASCII of length 20 pointing far past the end.
        let data = tiff_le(&[(0x010F, field::ASCII, 20, [0x00, 0x10, 0x00, 0x00])], 0);
        let err = parse(&data, ImageFormat::Jpeg, false).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer { .. }));
    }

    #[test]
    fn rejects_huge_count() {
        let data = tiff_le(&[(0x010F, field::DOUBLE, u32::MAX, [8, 0, 0, 0])], 0);
        assert!(parse(&data, ImageFormat::Jpeg, false).is_err());
    }

    #[test]
    fn rejects_self_referencing_sub_ifd() {
        // Exif pointer back at IFD0.
        let data = tiff_le(&[(pointer::EXIF, field::LONG, 1, [8, 0, 0, 0])], 0);
        let err = parse(&data, ImageFormat::Jpeg, false).unwrap_err();
        assert!(err.to_string().contains("visited twice"));
    }

    #[test]
    fn rejects_page_chain_loop() {
        // next-IFD pointer back at IFD0.
        let data = tiff_le(&[(0x0100, field::SHORT, 1, [1, 0, 0, 0])], 8);
        assert!(parse(&data, ImageFormat::Tiff, true).is_err());
        // Without page following the loop is never walked.
        assert!(parse(&data, ImageFormat::Jpeg, false).is_ok());
    }

    #[test]
    fn skips_unknown_field_types() {
        let data = tiff_le(&[(0x010F, 99, 1, [0, 0, 0, 0]), (0x0112, field::SHORT, 1, [1, 0, 0, 0])], 0);
        let tree = parse(&data, ImageFormat::Jpeg, false).unwrap();
        assert_eq!(tree.ifd0.entries.len(), 1);
    }
}
