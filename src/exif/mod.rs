//! Metadata reading and the IFD serializer.
//!
//! - [`read_metadata`] sniffs a stream, walks its container and classifies
//!   every EXIF entry, text chunk, XMP property and opaque block it finds.
//! - [`encode_exif`] and [`write_ifd`] produce fresh TIFF-structured data for
//!   the rebuilders.
//!
//! IFD parsing is bounded: every offset is checked against the buffer, an
//! IFD visited twice is an error, and entry and page counts are capped at
//! [`MAX_IFD_ENTRIES`] and [`MAX_PAGES`].

mod ifd;
mod reader;
mod writer;
mod xmp;

pub use ifd::{ByteOrder, Entry, ExifTree, Ifd, MAX_IFD_ENTRIES, MAX_PAGES, field, parse, pointer, type_size};
pub use reader::{Metadata, carry, read_metadata};
pub use writer::{HEADER_LEN, TiffBuilder, encode_exif, ifd_len, write_header, write_ifd};
