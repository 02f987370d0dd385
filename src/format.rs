//! Container sniffing from magic bytes.
//!
//! Detection never looks at the file extension: a `.jpg` holding PNG bytes is
//! a PNG, and a `.png` holding text is [`ImageFormat::Unknown`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading bytes that is always enough to classify a stream.
pub const SNIFF_LEN: usize = 32;

/// The container format of an image, as determined by [`sniff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
    /// Anything else, including empty input. Callers skip these silently.
    Unknown,
}

impl ImageFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::WebP => "WebP",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != ImageFormat::Unknown
    }

    /// The matching codec in the `image` crate, used when pixels are rebaked.
    pub fn codec(&self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::WebP => Some(image::ImageFormat::WebP),
            ImageFormat::Tiff => Some(image::ImageFormat::Tiff),
            ImageFormat::Unknown => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod magic {
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    pub const RIFF: &[u8] = b"RIFF";
    pub const WEBP: &[u8] = b"WEBP";
    pub const TIFF_LE: &[u8] = &[0x49, 0x49, 0x2A, 0x00];
    pub const TIFF_BE: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A];
}

/// Classify a byte stream by its leading magic bytes.
///
/// Only the first [`SNIFF_LEN`] bytes are consulted.
pub fn sniff(data: &[u8]) -> ImageFormat {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if head.starts_with(magic::JPEG) {
        ImageFormat::Jpeg
    } else if head.starts_with(magic::PNG) {
        ImageFormat::Png
    } else if head.len() >= 12 && head.starts_with(magic::RIFF) && &head[8..12] == magic::WEBP {
        ImageFormat::WebP
    } else if head.starts_with(magic::TIFF_LE) || head.starts_with(magic::TIFF_BE) {
        ImageFormat::Tiff
    } else {
        ImageFormat::Unknown
    }
}

/// Sniff the head of a file on disk. Directories, unreadable paths and empty
/// files all come back as [`ImageFormat::Unknown`].
pub fn sniff_path(path: &std::path::Path) -> ImageFormat {
    use std::io::Read;

    if path.is_dir() {
        return ImageFormat::Unknown;
    }
    let Ok(file) = std::fs::File::open(path) else {
        return ImageFormat::Unknown;
    };
    let mut head = Vec::with_capacity(SNIFF_LEN);
    match file.take(SNIFF_LEN as u64).read_to_end(&mut head) {
        Ok(_) => sniff(&head),
        Err(_) => ImageFormat::Unknown,
    }
}
