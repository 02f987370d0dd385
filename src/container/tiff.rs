//! TIFF rewriting.
//!
//! In a TIFF the metadata and the image description share one IFD, so a
//! clean file is written from scratch: a new header, each page's directory
//! reduced to the structural whitelist, the retained tags merged into IFD0
//! (with an Exif sub-IFD for the capture date), and then every strip or tile
//! copied across with its offset rewritten. Byte order is preserved so sample
//! data never needs swapping.

use super::{Density, Plan};
use crate::error::{Error, Result};
use crate::exif::{self, ByteOrder, Entry, ExifTree, Ifd, field, ifd_len, pointer, write_ifd};
use crate::format::ImageFormat;
use crate::rebuild::exif_builder;

pub mod tags {
    pub const STRIP_OFFSETS: u16 = 273;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const X_RESOLUTION: u16 = 282;
    pub const Y_RESOLUTION: u16 = 283;
    pub const RESOLUTION_UNIT: u16 = 296;
    pub const XMP: u16 = 700;
    pub const ICC_PROFILE: u16 = 34675;
}

/// Tags needed to decode the pixels. Everything else is dropped.
const STRUCTURAL: &[u16] = &[
    254, // NewSubfileType
    256, // ImageWidth
    257, // ImageLength
    258, // BitsPerSample
    259, // Compression
    262, // PhotometricInterpretation
    266, // FillOrder
    273, // StripOffsets
    277, // SamplesPerPixel
    278, // RowsPerStrip
    279, // StripByteCounts
    284, // PlanarConfiguration
    317, // Predictor
    320, // ColorMap
    322, // TileWidth
    323, // TileLength
    324, // TileOffsets
    325, // TileByteCounts
    338, // ExtraSamples
    339, // SampleFormat
    347, // JPEGTables
    529, // YCbCrCoefficients
    530, // YCbCrSubSampling
    531, // YCbCrPositioning
    532, // ReferenceBlackWhite
];

pub fn parse(data: &[u8]) -> Result<ExifTree> {
    exif::parse(data, ImageFormat::Tiff, true)
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::malformed(ImageFormat::Tiff, reason)
}

/// Resolution of a page, if it declares one.
pub fn density(ifd: &Ifd, order: ByteOrder) -> Option<Density> {
    let rational = |code| match ifd.get(code)?.decode(order) {
        crate::tags::TagValue::Rational(v) => v.first().copied(),
        _ => None,
    };
    let unit = ifd
        .get(tags::RESOLUTION_UNIT)
        .and_then(|e| e.first_unsigned(order))
        .unwrap_or(2) as u16;
    Some(Density::Tiff {
        x: rational(tags::X_RESOLUTION)?,
        y: rational(tags::Y_RESOLUTION)?,
        unit,
    })
}

/// A page being rewritten: its new directory and the pixel blocks it owns.
struct Page<'a> {
    entries: Vec<Entry>,
    offsets_code: u16,
    blocks: Vec<&'a [u8]>,
}

fn pixel_blocks<'a>(data: &'a [u8], ifd: &Ifd, order: ByteOrder) -> Result<(u16, Vec<&'a [u8]>)> {
    let (offsets_code, counts_code) = if ifd.get(tags::STRIP_OFFSETS).is_some() {
        (tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
    } else if ifd.get(tags::TILE_OFFSETS).is_some() {
        (tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
    } else {
        return Err(malformed("page has neither strips nor tiles"));
    };

    let values = |code| {
        ifd.get(code)
            .and_then(|e| e.unsigned(order))
            .ok_or_else(|| malformed(format!("tag {code} missing or not an integer")))
    };
    let offsets = values(offsets_code)?;
    let counts = values(counts_code)?;
    if offsets.len() != counts.len() {
        return Err(malformed("strip/tile offset and byte count lengths differ"));
    }

    let blocks = offsets
        .iter()
        .zip(&counts)
        .map(|(&off, &len)| {
            let start = off as usize;
            start
                .checked_add(len as usize)
                .and_then(|end| data.get(start..end))
                .ok_or_else(|| malformed(format!("pixel block {off}+{len} outside stream")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((offsets_code, blocks))
}

fn structural_entries(ifd: &Ifd) -> Vec<Entry> {
    ifd.entries
        .iter()
        .filter(|e| STRUCTURAL.contains(&e.code))
        .cloned()
        .collect()
}

/// Replace (or add) an entry by code.
fn set_entry(entries: &mut Vec<Entry>, entry: Entry) {
    entries.retain(|e| e.code != entry.code);
    entries.push(entry);
}

pub fn rebuild(source: &[u8], plan: Plan<'_>) -> Result<Vec<u8>> {
    let tree = parse(source)?;
    let order = tree.order;
    let retained = exif_builder(plan.retained, order);

    let mut pages = Vec::with_capacity(tree.page_count());
    for (index, ifd) in std::iter::once(&tree.ifd0).chain(&tree.pages).enumerate() {
        let mut entries = structural_entries(ifd);
        let (offsets_code, blocks) = pixel_blocks(source, ifd, order)?;
        // Sized placeholder; real offsets are patched in once the layout is known.
        set_entry(&mut entries, Entry::long(offsets_code, &vec![0; blocks.len()], order));

        if index == 0 {
            if let Some(Density::Tiff { x, y, unit }) = plan.carry.density {
                set_entry(&mut entries, Entry::rational(tags::X_RESOLUTION, &[x], order));
                set_entry(&mut entries, Entry::rational(tags::Y_RESOLUTION, &[y], order));
                set_entry(&mut entries, Entry::short(tags::RESOLUTION_UNIT, &[unit], order));
            }
            if let Some(profile) = plan.carry.icc.as_ref().and_then(|icc| icc.blocks.first()) {
                set_entry(
                    &mut entries,
                    Entry {
                        code: tags::ICC_PROFILE,
                        field_type: field::UNDEFINED,
                        count: profile.len() as u32,
                        data: profile.clone(),
                    },
                );
            }
            for entry in &retained.ifd0 {
                set_entry(&mut entries, entry.clone());
            }
            if !retained.exif.is_empty() {
                set_entry(&mut entries, Entry::long(pointer::EXIF, &[0], order));
            }
        }

        pages.push(Page {
            entries,
            offsets_code,
            blocks,
        });
    }

    // Layout: header | page IFDs | Exif IFD | pixel blocks.
    let mut cursor = exif::HEADER_LEN;
    let mut ifd_offsets = Vec::with_capacity(pages.len());
    for page in &pages {
        ifd_offsets.push(cursor);
        cursor += ifd_len(&page.entries);
    }
    let exif_offset = cursor;
    if !retained.exif.is_empty() {
        cursor += ifd_len(&retained.exif);
    }
    for page in &mut pages {
        let mut offsets = Vec::with_capacity(page.blocks.len());
        for block in &page.blocks {
            offsets.push(
                u32::try_from(cursor).map_err(|_| Error::Encode("TIFF exceeds 4 GiB".into()))?,
            );
            cursor += block.len() + (block.len() & 1);
        }
        set_entry(&mut page.entries, Entry::long(page.offsets_code, &offsets, order));
    }
    if !retained.exif.is_empty() {
        set_entry(
            &mut pages[0].entries,
            Entry::long(pointer::EXIF, &[exif_offset as u32], order),
        );
    }

    let mut out = Vec::with_capacity(cursor);
    exif::write_header(&mut out, order);
    for (i, page) in pages.iter().enumerate() {
        let next = ifd_offsets.get(i + 1).copied().unwrap_or(0) as u32;
        debug_assert_eq!(out.len(), ifd_offsets[i]);
        write_ifd(&mut out, order, &page.entries, next);
    }
    if !retained.exif.is_empty() {
        write_ifd(&mut out, order, &retained.exif, 0);
    }
    for page in &pages {
        for block in &page.blocks {
            out.extend_from_slice(block);
            if block.len() % 2 == 1 {
                out.push(0);
            }
        }
    }
    debug_assert_eq!(out.len(), cursor);

    log::debug!("TIFF: rewrote {} page(s) in {order:?} byte order", pages.len());
    Ok(out)
}
