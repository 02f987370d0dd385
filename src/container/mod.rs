//! Container framing and re-serialization.
//!
//! Each submodule knows how one container is framed: it parses the
//! segment/chunk/IFD layout for the reader, and rebuilds a clean stream by
//! keeping a whitelist of structural pieces and inserting only what the
//! retention and structure policies hand it. Nothing is removed by name; any
//! block the whitelist does not know is left behind.

pub mod jpeg;
pub mod png;
pub mod tiff;
pub mod webp;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::tags::TagSet;

/// An ICC profile in the native framing of the container it came from: the
/// APP2 payloads of a JPEG, the `iCCP` payload of a PNG, the raw profile of a
/// WebP `ICCP` chunk or TIFF tag 34675.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccProfile {
    pub blocks: Vec<Vec<u8>>,
}

impl IccProfile {
    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pixel density as stored by each container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Density {
    /// JFIF APP0: units 0 = aspect ratio only, 1 = dots/inch, 2 = dots/cm.
    Jfif { units: u8, x: u16, y: u16 },
    /// PNG `pHYs`: pixels per unit, unit 1 = metre.
    Phys { x: u32, y: u32, unit: u8 },
    /// TIFF X/YResolution rationals and ResolutionUnit.
    Tiff { x: (u32, u32), y: (u32, u32), unit: u16 },
}

/// Structural facts about a container that are not metadata tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    /// Frames (APNG, animated WebP) or pages (TIFF). One for still images.
    pub frames: usize,
    pub animated: bool,
    pub icc: Option<IccProfile>,
    pub density: Option<Density>,
}

impl Structure {
    pub fn still() -> Self {
        Self {
            frames: 1,
            ..Self::default()
        }
    }

    pub fn is_multi_frame(&self) -> bool {
        self.animated || self.frames > 1
    }
}

/// Structural blocks taken from the original and put back into the rebuilt
/// stream. Empty means "drop them".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Carry {
    pub icc: Option<IccProfile>,
    pub density: Option<Density>,
}

/// Everything a rebuilder needs besides the source bytes.
#[derive(Debug, Clone, Copy)]
pub struct Plan<'a> {
    /// The minimal tag set to serialize. Only EXIF-identified tags are
    /// written; everything else in the source is left out.
    pub retained: &'a TagSet,
    pub carry: &'a Carry,
}

/// Rebuild `source` as a metadata-minimal stream of the same format.
pub fn rebuild(format: ImageFormat, source: &[u8], plan: Plan<'_>) -> Result<Vec<u8>> {
    let out = match format {
        ImageFormat::Jpeg => jpeg::rebuild(source, plan)?,
        ImageFormat::Png => png::rebuild(source, plan)?,
        ImageFormat::WebP => webp::rebuild(source, plan)?,
        ImageFormat::Tiff => tiff::rebuild(source, plan)?,
        ImageFormat::Unknown => return Err(Error::NotAnImage),
    };
    log::debug!("rebuilt {format}: {} -> {} bytes", source.len(), out.len());
    Ok(out)
}
