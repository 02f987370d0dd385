//! WebP (RIFF) framing.
//!
//! ```text
//! "RIFF" <size u32 LE> "WEBP"
//! chunk*: <fourcc> <size u32 LE> <payload> [pad to even]
//! ```
//!
//! A rebuilt WebP keeps the bitstream chunks (`VP8 `, `VP8L`, `ALPH`) and the
//! animation chunks (`ANIM`, `ANMF`). `VP8X` is regenerated so its flags match
//! what is actually present; it is synthesized from the bitstream header when
//! the output needs the extended layout and the source did not have it.

use super::Plan;
use crate::error::{Error, Result};
use crate::exif::{ByteOrder, encode_exif};
use crate::format::ImageFormat;
use crate::rebuild::exif_builder;

pub mod fourcc {
    pub const VP8: [u8; 4] = *b"VP8 ";
    pub const VP8L: [u8; 4] = *b"VP8L";
    pub const VP8X: [u8; 4] = *b"VP8X";
    pub const ALPH: [u8; 4] = *b"ALPH";
    pub const ANIM: [u8; 4] = *b"ANIM";
    pub const ANMF: [u8; 4] = *b"ANMF";
    pub const ICCP: [u8; 4] = *b"ICCP";
    pub const EXIF: [u8; 4] = *b"EXIF";
    pub const XMP: [u8; 4] = *b"XMP ";
}

/// VP8X feature flags.
pub mod flags {
    pub const ANIMATION: u8 = 0x02;
    pub const XMP: u8 = 0x04;
    pub const EXIF: u8 = 0x08;
    pub const ALPHA: u8 = 0x10;
    pub const ICC: u8 = 0x20;
}

const KEPT: &[[u8; 4]] = &[fourcc::ANIM, fourcc::ANMF, fourcc::ALPH, fourcc::VP8, fourcc::VP8L];

/// One RIFF chunk, borrowing its payload from the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub fourcc: [u8; 4],
    pub data: &'a [u8],
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::malformed(ImageFormat::WebP, reason)
}

/// Walk the chunk list. Every declared length is checked against both the
/// RIFF size and the real stream length.
pub fn parse(data: &[u8]) -> Result<Vec<Chunk<'_>>> {
    if data.len() < 12 || &data[..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(malformed("missing RIFF/WEBP header"));
    }
    let declared = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let end = declared
        .checked_add(8)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| malformed(format!("RIFF size {declared} exceeds stream of {} bytes", data.len())))?;

    let mut chunks = Vec::new();
    let mut pos = 12;
    while pos < end {
        let header = data
            .get(pos..pos + 8)
            .filter(|_| pos + 8 <= end)
            .ok_or_else(|| malformed(format!("truncated chunk header at {pos}")))?;
        let fourcc = [header[0], header[1], header[2], header[3]];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let body = pos + 8;
        let body_end = body
            .checked_add(size)
            .filter(|&e| e <= end)
            .ok_or_else(|| {
                malformed(format!(
                    "chunk {} of {size} bytes runs past end",
                    String::from_utf8_lossy(&fourcc)
                ))
            })?;
        chunks.push(Chunk {
            fourcc,
            data: &data[body..body_end],
        });
        // A missing pad byte on the final chunk is tolerated.
        pos = body_end + (size & 1);
    }
    Ok(chunks)
}

/// Canvas size and alpha usage, from `VP8X` or else the bitstream header.
pub fn canvas(chunks: &[Chunk<'_>]) -> Option<(u32, u32, bool)> {
    let u24 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], 0]);

    if let Some(vp8x) = chunks.iter().find(|c| c.fourcc == fourcc::VP8X) {
        let d = vp8x.data;
        if d.len() >= 10 {
            return Some((u24(&d[4..7]) + 1, u24(&d[7..10]) + 1, d[0] & flags::ALPHA != 0));
        }
    }
    for chunk in chunks {
        let d = chunk.data;
        match chunk.fourcc {
            fourcc::VP8 if d.len() >= 10 && d[3..6] == [0x9D, 0x01, 0x2A] => {
                let w = u16::from_le_bytes([d[6], d[7]]) & 0x3FFF;
                let h = u16::from_le_bytes([d[8], d[9]]) & 0x3FFF;
                let alpha = chunks.iter().any(|c| c.fourcc == fourcc::ALPH);
                return Some((w as u32, h as u32, alpha));
            }
            fourcc::VP8L if d.len() >= 5 && d[0] == 0x2F => {
                let bits = u32::from_le_bytes([d[1], d[2], d[3], d[4]]);
                let w = (bits & 0x3FFF) + 1;
                let h = ((bits >> 14) & 0x3FFF) + 1;
                return Some((w, h, (bits >> 28) & 1 == 1));
            }
            _ => {}
        }
    }
    None
}

/// Whether the stream is an animation (flag set or `ANIM` present).
pub fn is_animated(chunks: &[Chunk<'_>]) -> bool {
    chunks.iter().any(|c| {
        c.fourcc == fourcc::ANIM
            || (c.fourcc == fourcc::VP8X && c.data.first().is_some_and(|f| f & flags::ANIMATION != 0))
    })
}

pub fn vp8x_payload(flag_bits: u8, width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![flag_bits, 0, 0, 0];
    out.extend_from_slice(&(width.saturating_sub(1)).to_le_bytes()[..3]);
    out.extend_from_slice(&(height.saturating_sub(1)).to_le_bytes()[..3]);
    out
}

fn write_chunk(out: &mut Vec<u8>, fourcc: [u8; 4], data: &[u8]) {
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

/// Serialize chunks into a complete RIFF stream.
pub fn assemble(chunks: &[Chunk<'_>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + chunks.iter().map(|c| c.data.len() + 9).sum::<usize>());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(b"WEBP");
    for chunk in chunks {
        write_chunk(&mut out, chunk.fourcc, chunk.data);
    }
    let size = (out.len() - 8) as u32;
    out[4..8].copy_from_slice(&size.to_le_bytes());
    out
}

pub fn rebuild(source: &[u8], plan: Plan<'_>) -> Result<Vec<u8>> {
    let chunks = parse(source)?;
    let had_vp8x = chunks.iter().any(|c| c.fourcc == fourcc::VP8X);
    let animated = is_animated(&chunks);

    let icc = plan.carry.icc.as_ref().and_then(|icc| icc.blocks.first());
    let builder = exif_builder(plan.retained, ByteOrder::Little);
    let exif = (!builder.is_empty()).then(|| encode_exif(&builder));

    let body: Vec<Chunk<'_>> = chunks.iter().copied().filter(|c| KEPT.contains(&c.fourcc)).collect();
    if !body.iter().any(|c| matches!(c.fourcc, fourcc::VP8 | fourcc::VP8L | fourcc::ANMF)) {
        return Err(malformed("no image data chunk"));
    }
    log::debug!("WebP: dropped {} chunks", chunks.len() - body.len());

    let needs_vp8x = had_vp8x || animated || icc.is_some() || exif.is_some();
    let mut vp8x = Vec::new();
    if needs_vp8x {
        let (width, height, alpha) =
            canvas(&chunks).ok_or_else(|| malformed("cannot determine canvas size"))?;
        let mut bits = 0;
        if icc.is_some() {
            bits |= flags::ICC;
        }
        if alpha {
            bits |= flags::ALPHA;
        }
        if exif.is_some() {
            bits |= flags::EXIF;
        }
        if animated {
            bits |= flags::ANIMATION;
        }
        vp8x = vp8x_payload(bits, width, height);
    }

    let mut out_chunks = Vec::with_capacity(body.len() + 3);
    if needs_vp8x {
        out_chunks.push(Chunk {
            fourcc: fourcc::VP8X,
            data: &vp8x,
        });
    }
    if let Some(icc) = icc {
        out_chunks.push(Chunk {
            fourcc: fourcc::ICCP,
            data: icc,
        });
    }
    out_chunks.extend(body);
    if let Some(exif) = &exif {
        out_chunks.push(Chunk {
            fourcc: fourcc::EXIF,
            data: exif,
        });
    }

    Ok(assemble(&out_chunks))
}
