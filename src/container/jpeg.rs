//! JPEG framing.
//!
//! The header up to the first scan is parsed with `img-parts`. Everything
//! after it is walked marker by marker here, since `img-parts` keeps the rest
//! of the stream as one opaque blob.
//!
//! A rebuilt JPEG keeps every non-APP header segment (quantization and
//! Huffman tables, frame header) plus an Adobe APP14, which carries the color
//! transform. After the first scan only scan headers, tables, restart markers
//! and entropy-coded data survive, and the stream ends at the first EOI. A
//! fresh JFIF APP0, the minimal EXIF APP1 and any carried ICC APP2 segments
//! are put at the front.

use img_parts::Bytes;
use img_parts::jpeg::{Jpeg, JpegSegment};

use super::{Density, Plan};
use crate::error::{Error, Result};
use crate::exif::{ByteOrder, encode_exif};
use crate::format::ImageFormat;
use crate::rebuild::exif_builder;

pub mod markers {
    pub const TEM: u8 = 0x01;
    pub const DHT: u8 = 0xC4;
    pub const DAC: u8 = 0xCC;
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const DNL: u8 = 0xDC;
    pub const DRI: u8 = 0xDD;
    pub const APP0: u8 = 0xE0;
    pub const APP1: u8 = 0xE1;
    pub const APP2: u8 = 0xE2;
    pub const APP13: u8 = 0xED;
    pub const APP14: u8 = 0xEE;
    pub const APP15: u8 = 0xEF;
    pub const COM: u8 = 0xFE;
}

use markers::*;

pub const JFIF_ID: &[u8] = b"JFIF\0";
pub const JFXX_ID: &[u8] = b"JFXX\0";
pub const EXIF_ID: &[u8] = b"Exif\0\0";
pub const XMP_ID: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub const XMP_EXTENSION_ID: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
pub const ICC_ID: &[u8] = b"ICC_PROFILE\0";
pub const PHOTOSHOP_ID: &[u8] = b"Photoshop 3.0\0";
const ADOBE_ID: &[u8] = b"Adobe";

/// Parse the segment layout of a JPEG stream.
pub fn parse(data: &[u8]) -> Result<Jpeg> {
    Jpeg::from_bytes(Bytes::copy_from_slice(data))
        .map_err(|e| Error::malformed(ImageFormat::Jpeg, e.to_string()))
}

/// Segments in front of the first scan.
pub fn header(jpeg: &Jpeg) -> impl Iterator<Item = &JpegSegment> {
    jpeg.segments().iter().take_while(|s| s.marker() != SOS)
}

fn is_structural(segment: &JpegSegment) -> bool {
    match segment.marker() {
        APP14 => segment.contents().starts_with(ADOBE_ID),
        APP0..=APP15 | COM => false,
        _ => true,
    }
}

fn is_standalone(marker: u8) -> bool {
    matches!(marker, TEM | RST0..=RST7 | SOI | EOI)
}

/// Segments that may legally follow the first scan and are needed to decode.
fn is_scan_structure(marker: u8) -> bool {
    matches!(marker, SOS | DHT | DQT | DRI | DNL | DAC)
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::malformed(ImageFormat::Jpeg, reason)
}

/// The marker starting at `pos`, after any fill bytes, and the offset just
/// past it.
fn marker_at(data: &[u8], mut pos: usize) -> Result<(u8, usize)> {
    if data.get(pos) != Some(&0xFF) {
        return Err(malformed(format!("expected a marker at offset {pos}")));
    }
    while data.get(pos) == Some(&0xFF) {
        pos += 1;
    }
    match data.get(pos) {
        Some(&marker) => Ok((marker, pos + 1)),
        None => Err(malformed("stream ends inside a marker")),
    }
}

/// Body bounds of the length-prefixed segment whose length field is at `pos`.
fn segment_body(data: &[u8], pos: usize) -> Result<(usize, usize)> {
    let len = data
        .get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
        .ok_or_else(|| malformed("truncated segment length"))?;
    if len < 2 || pos + len > data.len() {
        return Err(malformed(format!("segment length {len} at offset {pos} overruns the stream")));
    }
    Ok((pos + 2, pos + len))
}

/// Offset of the first SOS marker.
fn first_scan(data: &[u8]) -> Result<usize> {
    let mut pos = 2;
    loop {
        let (marker, next) = marker_at(data, pos)?;
        match marker {
            SOS => return Ok(pos),
            EOI => return Err(malformed("no scan before end of image")),
            m if is_standalone(m) => pos = next,
            _ => pos = segment_body(data, next)?.1,
        }
    }
}

/// End of the entropy-coded data starting at `pos`: the next marker that is
/// neither byte stuffing nor a restart marker.
fn entropy_end(data: &[u8], mut pos: usize) -> usize {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            match data[pos + 1] {
                0x00 | RST0..=RST7 => {
                    pos += 2;
                    continue;
                }
                0xFF => {}
                _ => return pos,
            }
        }
        pos += 1;
    }
    data.len()
}

/// What follows the first start-of-scan marker.
#[derive(Debug, Default)]
pub struct ScanTail<'a> {
    /// Scan headers, tables, restart markers and entropy-coded data,
    /// terminated by EOI.
    pub image: Vec<u8>,
    /// APPn and COM segments found between or after the scans.
    pub segments: Vec<(u8, &'a [u8])>,
    /// Bytes after the first EOI.
    pub trailer: &'a [u8],
}

/// Walk the stream from its first scan to the first EOI.
///
/// A stream that runs out before EOI is closed with one.
pub fn scan_tail(data: &[u8]) -> Result<ScanTail<'_>> {
    let mut pos = first_scan(data)?;
    let mut tail = ScanTail::default();

    while pos < data.len() {
        let (marker, next) = marker_at(data, pos)?;
        match marker {
            EOI => {
                tail.image.extend_from_slice(&[0xFF, EOI]);
                tail.trailer = &data[next..];
                return Ok(tail);
            }
            m if is_standalone(m) => {
                tail.image.extend_from_slice(&[0xFF, m]);
                pos = entropy_end(data, next);
                tail.image.extend_from_slice(&data[next..pos]);
            }
            m => {
                let (body, end) = segment_body(data, next)?;
                if is_scan_structure(m) {
                    tail.image.extend_from_slice(&[0xFF, m]);
                    tail.image.extend_from_slice(&data[next..end]);
                    pos = end;
                    if m == SOS {
                        pos = entropy_end(data, end);
                        tail.image.extend_from_slice(&data[end..pos]);
                    }
                } else {
                    if matches!(m, APP0..=APP15 | COM) {
                        tail.segments.push((m, &data[body..end]));
                    } else {
                        log::debug!("JPEG: dropping marker {m:#04X} after the first scan");
                    }
                    pos = end;
                }
            }
        }
    }

    log::debug!("JPEG: stream ends without EOI");
    tail.image.extend_from_slice(&[0xFF, EOI]);
    Ok(tail)
}

/// Density stored in a JFIF APP0 payload.
pub fn jfif_density(contents: &[u8]) -> Option<Density> {
    if !contents.starts_with(JFIF_ID) || contents.len() < 12 {
        return None;
    }
    Some(Density::Jfif {
        units: contents[7],
        x: u16::from_be_bytes([contents[8], contents[9]]),
        y: u16::from_be_bytes([contents[10], contents[11]]),
    })
}

/// A JFIF 1.02 APP0 payload with no thumbnail. Without a carried density the
/// header reports a 1:1 aspect ratio and no physical units.
fn jfif_contents(density: Option<&Density>) -> Vec<u8> {
    let (units, x, y) = match density {
        Some(&Density::Jfif { units, x, y }) => (units, x, y),
        _ => (0, 1, 1),
    };
    let mut out = JFIF_ID.to_vec();
    out.extend_from_slice(&[1, 2, units]);
    out.extend_from_slice(&x.to_be_bytes());
    out.extend_from_slice(&y.to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out
}

fn write_segment(out: &mut Vec<u8>, marker: u8, contents: &[u8]) -> Result<()> {
    out.extend_from_slice(&[0xFF, marker]);
    if is_standalone(marker) {
        return Ok(());
    }
    let len = u16::try_from(contents.len() + 2)
        .map_err(|_| Error::Encode(format!("JPEG segment {marker:#04X} exceeds 64 KiB")))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(contents);
    Ok(())
}

pub fn rebuild(source: &[u8], plan: Plan<'_>) -> Result<Vec<u8>> {
    let jpeg = parse(source)?;
    let tail = scan_tail(source)?;

    let had_jfif = header(&jpeg).any(|s| s.marker() == APP0 && s.contents().starts_with(JFIF_ID));
    let kept: Vec<&JpegSegment> = header(&jpeg).filter(|s| is_structural(s)).collect();
    log::debug!(
        "JPEG: dropped {} header segments, {} after the first scan, {} trailing bytes",
        header(&jpeg).count() - kept.len(),
        tail.segments.len(),
        tail.trailer.len()
    );

    let mut out = vec![0xFF, SOI];
    let density = plan.carry.density.as_ref();
    if had_jfif || matches!(density, Some(Density::Jfif { .. })) {
        write_segment(&mut out, APP0, &jfif_contents(density))?;
    }

    let builder = exif_builder(plan.retained, ByteOrder::Little);
    if !builder.is_empty() {
        let contents = [EXIF_ID, &encode_exif(&builder)[..]].concat();
        write_segment(&mut out, APP1, &contents)?;
    }

    if let Some(icc) = &plan.carry.icc {
        for block in &icc.blocks {
            write_segment(&mut out, APP2, block)?;
        }
    }

    for segment in kept {
        write_segment(&mut out, segment.marker(), segment.contents())?;
    }
    out.extend_from_slice(&tail.image);
    Ok(out)
}
