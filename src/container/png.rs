//! PNG framing, via `img-parts`.
//!
//! Rebuilt PNGs keep the critical chunks, the color and transparency chunks a
//! decoder needs to render the pixels correctly, and the APNG control chunks.
//! Text, time, EXIF, ICC and density chunks are dropped, and the last three
//! are re-inserted after `IHDR` only when handed over by the plan.

use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};

use super::{Density, Plan};
use crate::error::{Error, Result};
use crate::exif::{ByteOrder, encode_exif};
use crate::format::ImageFormat;
use crate::rebuild::exif_builder;

pub mod kinds {
    pub const IHDR: [u8; 4] = *b"IHDR";
    pub const EXIF: [u8; 4] = *b"eXIf";
    pub const TEXT: [u8; 4] = *b"tEXt";
    pub const ZTXT: [u8; 4] = *b"zTXt";
    pub const ITXT: [u8; 4] = *b"iTXt";
    pub const TIME: [u8; 4] = *b"tIME";
    pub const ICCP: [u8; 4] = *b"iCCP";
    pub const PHYS: [u8; 4] = *b"pHYs";
    pub const ACTL: [u8; 4] = *b"acTL";
}

/// Ancillary chunks that describe how to render pixels, not who made them.
const KEPT_ANCILLARY: &[[u8; 4]] = &[
    *b"tRNS", *b"gAMA", *b"cHRM", *b"sRGB", *b"sBIT", *b"bKGD", *b"hIST", *b"cICP", *b"mDCV",
    *b"cLLI", *b"acTL", *b"fcTL", *b"fdAT",
];

pub fn parse(data: &[u8]) -> Result<Png> {
    Png::from_bytes(Bytes::copy_from_slice(data))
        .map_err(|e| Error::malformed(ImageFormat::Png, e.to_string()))
}

fn is_structural(chunk: &PngChunk) -> bool {
    let kind = chunk.kind();
    // Critical chunks (upper-case first letter) can never be dropped safely.
    kind[0].is_ascii_uppercase() || KEPT_ANCILLARY.contains(&kind)
}

/// Density stored in a `pHYs` payload.
pub fn phys_density(contents: &[u8]) -> Option<Density> {
    if contents.len() < 9 {
        return None;
    }
    Some(Density::Phys {
        x: u32::from_be_bytes([contents[0], contents[1], contents[2], contents[3]]),
        y: u32::from_be_bytes([contents[4], contents[5], contents[6], contents[7]]),
        unit: contents[8],
    })
}

pub fn rebuild(source: &[u8], plan: Plan<'_>) -> Result<Vec<u8>> {
    let mut png = parse(source)?;

    let before = png.chunks().len();
    png.chunks_mut().retain(is_structural);
    log::debug!("PNG: dropped {} chunks", before - png.chunks().len());

    let ihdr = png
        .chunks()
        .iter()
        .position(|c| c.kind() == kinds::IHDR)
        .ok_or_else(|| Error::malformed(ImageFormat::Png, "missing IHDR"))?;

    let mut inserted = Vec::new();
    if let Some(block) = plan.carry.icc.as_ref().and_then(|icc| icc.blocks.first()) {
        inserted.push(PngChunk::new(kinds::ICCP, Bytes::copy_from_slice(block)));
    }
    if let Some(Density::Phys { x, y, unit }) = plan.carry.density {
        let mut contents = Vec::with_capacity(9);
        contents.extend_from_slice(&x.to_be_bytes());
        contents.extend_from_slice(&y.to_be_bytes());
        contents.push(unit);
        inserted.push(PngChunk::new(kinds::PHYS, Bytes::from(contents)));
    }
    let builder = exif_builder(plan.retained, ByteOrder::Little);
    if !builder.is_empty() {
        inserted.push(PngChunk::new(kinds::EXIF, Bytes::from(encode_exif(&builder))));
    }

    png.chunks_mut().splice(ihdr + 1..ihdr + 1, inserted);
    Ok(png.encoder().bytes().to_vec())
}
