//! Baking the EXIF orientation into the pixels.
//!
//! Values follow the usual 8-state encoding:
//!
//! | value | transform                     |
//! |-------|-------------------------------|
//! | 1     | none                          |
//! | 2     | mirror horizontally           |
//! | 3     | rotate 180°                   |
//! | 4     | mirror vertically             |
//! | 5     | rotate 90° CW, then mirror    |
//! | 6     | rotate 90° CW                 |
//! | 7     | rotate 270° CW, then mirror   |
//! | 8     | rotate 270° CW                |

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

use crate::config::EncodeOptions;
use crate::error::{Error, Result};
use crate::format::ImageFormat;

/// Whether `orientation` asks for any pixel change.
pub fn needs_rebake(orientation: u8) -> bool {
    (2..=8).contains(&orientation)
}

/// Apply an orientation value to a decoded raster. Out-of-range values leave
/// the image untouched.
pub fn apply(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn unsupported(format: ImageFormat, err: impl std::fmt::Display) -> Error {
    Error::UnsupportedPixelFormat(format!("{format}: {err}"))
}

/// Decode `bytes`, bake `orientation` into the pixels and re-encode in the
/// same format. Only the first frame of an animation survives.
///
/// JPEG is re-encoded at `options.quality`; PNG and TIFF are lossless, and
/// WebP is written losslessly since that is the only WebP encoder available.
pub fn rebake(format: ImageFormat, bytes: &[u8], orientation: u8, options: &EncodeOptions) -> Result<Vec<u8>> {
    let codec = format.codec().ok_or(Error::NotAnImage)?;
    let img = image::load_from_memory_with_format(bytes, codec).map_err(|e| unsupported(format, e))?;
    log::debug!(
        "rebaking {format} {}x{} {:?} with orientation {orientation}",
        img.width(),
        img.height(),
        img.color()
    );
    let img = apply(img, orientation);

    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let img = match img {
                DynamicImage::ImageLuma8(_) => img,
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
            let encoder = JpegEncoder::new_with_quality(&mut out, options.quality);
            img.write_with_encoder(encoder).map_err(|e| unsupported(format, e))?;
        }
        ImageFormat::WebP => {
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
                .map_err(|e| unsupported(format, e))?;
        }
        ImageFormat::Png | ImageFormat::Tiff => {
            img.write_to(&mut out, codec).map_err(|e| unsupported(format, e))?;
        }
        ImageFormat::Unknown => return Err(Error::NotAnImage),
    }
    Ok(out.into_inner())
}
