//! Fixture builders shared by the unit tests.

use std::io::Cursor;

use img_parts::Bytes;
use img_parts::jpeg::JpegSegment;
use img_parts::png::PngChunk;

use crate::container::{jpeg, png, webp};
use crate::exif::{ByteOrder, Entry, TiffBuilder, encode_exif, ifd_len, write_header, write_ifd};

/// An RGB image where every pixel differs from its neighbours.
pub fn gradient(width: u32, height: u32) -> image::RgbImage {
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 31 % 256) as u8, (y * 57 % 256) as u8, ((x + y) * 13 % 256) as u8])
    })
}

pub fn encode(img: &image::RgbImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Insert APPn/COM segments right after the encoder's JFIF header.
pub fn jpeg_with_segments(base: Vec<u8>, segments: Vec<(u8, Vec<u8>)>) -> Vec<u8> {
    let mut parsed = jpeg::parse(&base).unwrap();
    let at = parsed
        .segments()
        .iter()
        .take_while(|s| s.marker() == jpeg::markers::APP0)
        .count();
    let new = segments
        .into_iter()
        .map(|(marker, contents)| JpegSegment::new_with_contents(marker, Bytes::from(contents)));
    parsed.segments_mut().splice(at..at, new);
    parsed.encoder().bytes().to_vec()
}

/// Insert a segment between the entropy-coded data and the final EOI.
pub fn jpeg_with_post_scan_segment(base: &[u8], marker: u8, contents: &[u8]) -> Vec<u8> {
    assert!(base.ends_with(&[0xFF, jpeg::markers::EOI]));
    let mut out = base[..base.len() - 2].to_vec();
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&(contents.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(contents);
    out.extend_from_slice(&[0xFF, jpeg::markers::EOI]);
    out
}

/// A small JPEG carrying `camera_exif()`, for appending after another image.
pub fn camera_jpeg() -> Vec<u8> {
    let base = encode(&gradient(4, 4), image::ImageFormat::Jpeg);
    jpeg_with_segments(base, vec![(jpeg::markers::APP1, exif_app1(&camera_exif()))])
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Insert chunks right after IHDR.
pub fn png_with_chunks(base: Vec<u8>, chunks: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    let mut parsed = png::parse(&base).unwrap();
    let new = chunks
        .into_iter()
        .map(|(kind, contents)| PngChunk::new(kind, Bytes::from(contents)));
    parsed.chunks_mut().splice(1..1, new);
    parsed.encoder().bytes().to_vec()
}

/// Wrap a simple WebP in VP8X and add chunks. `ICCP` goes before the image
/// data, everything else after it.
pub fn webp_with_chunks(base: &[u8], extra: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    let chunks = webp::parse(base).unwrap();
    let (width, height, alpha) = webp::canvas(&chunks).unwrap();

    let mut bits = 0;
    for (fourcc, _) in &extra {
        bits |= match *fourcc {
            webp::fourcc::ICCP => webp::flags::ICC,
            webp::fourcc::EXIF => webp::flags::EXIF,
            webp::fourcc::XMP => webp::flags::XMP,
            _ => 0,
        };
    }
    if alpha {
        bits |= webp::flags::ALPHA;
    }
    let vp8x = webp::vp8x_payload(bits, width, height);

    let mut out = vec![webp::Chunk {
        fourcc: webp::fourcc::VP8X,
        data: &vp8x,
    }];
    let (front, back): (Vec<_>, Vec<_>) = extra.iter().partition(|(f, _)| *f == webp::fourcc::ICCP);
    out.extend(front.iter().map(|(fourcc, data)| webp::Chunk { fourcc: *fourcc, data }));
    out.extend(chunks.iter().copied().filter(|c| c.fourcc != webp::fourcc::VP8X));
    out.extend(back.iter().map(|(fourcc, data)| webp::Chunk { fourcc: *fourcc, data }));
    webp::assemble(&out)
}

/// Typical camera EXIF: make/model, orientation 3, capture date and a GPS fix.
pub fn camera_exif() -> TiffBuilder {
    let order = ByteOrder::Little;
    let mut builder = TiffBuilder::new(order);
    builder.ifd0.push(Entry::ascii(0x010F, "Canon"));
    builder.ifd0.push(Entry::ascii(0x0110, "Canon EOS 5D"));
    builder.ifd0.push(Entry::short(0x0112, &[3], order));
    builder.ifd0.push(Entry::ascii(0x0132, "2021:06:01 12:00:00"));
    builder.exif.push(Entry::ascii(0x9003, "2021:06:01 11:59:58"));
    builder.exif.push(Entry::ascii(0xA431, "0123456789"));
    builder.gps.push(Entry::ascii(0x0001, "N"));
    builder.gps.push(Entry::rational(0x0002, &[(48, 1), (51, 1), (2940, 100)], order));
    builder.gps.push(Entry::ascii(0x0003, "E"));
    builder.gps.push(Entry::rational(0x0004, &[(2, 1), (17, 1), (4020, 100)], order));
    builder
}

pub fn exif_tiff(builder: &TiffBuilder) -> Vec<u8> {
    encode_exif(builder)
}

pub fn exif_app1(builder: &TiffBuilder) -> Vec<u8> {
    [jpeg::EXIF_ID, &encode_exif(builder)[..]].concat()
}

/// Uncompressed single-strip RGB TIFF with extra tags in IFD0 and optional
/// Exif/GPS directories.
pub fn tiff_fixture(
    img: &image::RgbImage,
    order: ByteOrder,
    ifd0_extra: Vec<Entry>,
    exif: Vec<Entry>,
    gps: Vec<Entry>,
) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let pixels = img.as_raw();

    let mut ifd0 = vec![
        Entry::long(256, &[width], order),
        Entry::long(257, &[height], order),
        Entry::short(258, &[8, 8, 8], order),
        Entry::short(259, &[1], order),
        Entry::short(262, &[2], order),
        Entry::long(273, &[0], order),
        Entry::short(277, &[3], order),
        Entry::long(278, &[height], order),
        Entry::long(279, &[pixels.len() as u32], order),
        Entry::short(284, &[1], order),
    ];
    ifd0.extend(ifd0_extra);
    if !exif.is_empty() {
        ifd0.push(Entry::long(crate::exif::pointer::EXIF, &[0], order));
    }
    if !gps.is_empty() {
        ifd0.push(Entry::long(crate::exif::pointer::GPS, &[0], order));
    }

    // Layout: header, IFD0, Exif IFD, GPS IFD, pixels.
    let ifd0_at = 8u32;
    let exif_at = ifd0_at + ifd_len(&ifd0) as u32;
    let gps_at = exif_at + if exif.is_empty() { 0 } else { ifd_len(&exif) as u32 };
    let pixels_at = gps_at + if gps.is_empty() { 0 } else { ifd_len(&gps) as u32 };

    let patch = |entries: &mut Vec<Entry>, code: u16, value: u32| {
        if let Some(e) = entries.iter_mut().find(|e| e.code == code) {
            *e = Entry::long(code, &[value], order);
        }
    };
    patch(&mut ifd0, 273, pixels_at);
    patch(&mut ifd0, crate::exif::pointer::EXIF, exif_at);
    patch(&mut ifd0, crate::exif::pointer::GPS, gps_at);

    let mut out = Vec::new();
    write_header(&mut out, order);
    write_ifd(&mut out, order, &ifd0, 0);
    if !exif.is_empty() {
        write_ifd(&mut out, order, &exif, 0);
    }
    if !gps.is_empty() {
        write_ifd(&mut out, order, &gps, 0);
    }
    assert_eq!(out.len() as u32, pixels_at);
    out.extend_from_slice(pixels);
    out
}

