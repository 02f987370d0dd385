use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::container::{self, IccProfile, Structure, jpeg, png, tiff, webp};
use crate::error::{Error, Result};
use crate::format::{ImageFormat, sniff};
use crate::tags::{ORIENTATION, RAW_PROFILE, RawTag, TagId, TagSet, TagValue, classify};

use super::{ifd, xmp};

/// Everything the reader learned about one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub format: ImageFormat,
    /// Classified tags. Unrecognized identifiers have already been dropped.
    pub tags: TagSet,
    pub structure: Structure,
}

/// Read and classify the metadata of an in-memory image.
///
/// Fails with [`Error::NotAnImage`] when the stream is not one of the four
/// supported containers, and with [`Error::MalformedContainer`] when its
/// framing or any embedded IFD does not fit inside the stream.
///
/// # Example
///
/// ```rust,no_run
/// use metaclean::exif::read_metadata;
/// use metaclean::tags::Category;
///
/// let bytes = std::fs::read("photo.jpg").unwrap();
/// let meta = read_metadata(&bytes).unwrap();
/// if meta.tags.categories().contains(&Category::Gps) {
///     println!("{:?}", meta.tags.gps_position());
/// }
/// ```
pub fn read_metadata(data: &[u8]) -> Result<Metadata> {
    let format = sniff(data);
    let (raw, structure) = match format {
        ImageFormat::Jpeg => read_jpeg(data)?,
        ImageFormat::Png => read_png(data)?,
        ImageFormat::WebP => read_webp(data)?,
        ImageFormat::Tiff => read_tiff(data)?,
        ImageFormat::Unknown => return Err(Error::NotAnImage),
    };

    let found = raw.len();
    let tags = classify(raw);
    log::debug!("{format}: {found} raw entries, {} recognized", tags.len());

    Ok(Metadata {
        format,
        tags,
        structure,
    })
}

fn block(name: &str, data: &[u8]) -> RawTag {
    RawTag::new(TagId::Block(name.to_string()), data.to_vec(), TagValue::Bytes(data.to_vec()))
}

fn exif_payload(data: &[u8]) -> &[u8] {
    data.strip_prefix(jpeg::EXIF_ID).unwrap_or(data)
}

// ── JPEG ────────────────────────────────────────────────────────────

/// How many images appended after EOI are opened in turn.
const MAX_APPENDED_IMAGES: usize = 8;

#[derive(Default)]
struct JpegTags {
    raw: Vec<RawTag>,
    /// Tags from secondary EXIF segments and appended images. The primary
    /// EXIF segment wins on conflicts.
    secondary: Vec<RawTag>,
    icc: Vec<Vec<u8>>,
    seen_exif: bool,
}

impl JpegTags {
    fn segment(&mut self, marker: u8, contents: &[u8], structure: &mut Structure) -> Result<()> {
        use jpeg::markers::*;

        match marker {
            APP0 if contents.starts_with(jpeg::JFIF_ID) => {
                structure.density = jpeg::jfif_density(contents);
                if contents.len() >= 14 && contents[12] > 0 && contents[13] > 0 {
                    self.raw.push(block("Thumbnail", &contents[14..]));
                }
            }
            APP0 if contents.starts_with(jpeg::JFXX_ID) => self.raw.push(block("Thumbnail", contents)),
            APP1 if contents.starts_with(jpeg::EXIF_ID) => {
                let tree = ifd::parse(&contents[jpeg::EXIF_ID.len()..], ImageFormat::Jpeg, false)?;
                if self.seen_exif {
                    self.secondary.extend(tree.raw_tags());
                } else {
                    self.seen_exif = true;
                    self.raw.extend(tree.raw_tags());
                }
            }
            APP1 if contents.starts_with(jpeg::XMP_ID) => {
                self.raw.extend(xmp::scan(&contents[jpeg::XMP_ID.len()..]));
            }
            APP1 if contents.starts_with(jpeg::XMP_EXTENSION_ID) => {
                self.raw.extend(xmp::scan(&contents[jpeg::XMP_EXTENSION_ID.len()..]));
            }
            APP2 if contents.starts_with(jpeg::ICC_ID) => self.icc.push(contents.to_vec()),
            APP13 if contents.starts_with(jpeg::PHOTOSHOP_ID) => self.raw.push(block("IPTC", contents)),
            COM => self.raw.push(RawTag::new(
                TagId::Block("Comment".into()),
                contents.to_vec(),
                TagValue::Text(String::from_utf8_lossy(contents).trim_end_matches('\0').to_string()),
            )),
            _ => {}
        }
        Ok(())
    }

    /// Tags of images appended after EOI, such as MPF secondary images.
    fn trailer(&mut self, trailer: &[u8], depth: usize) {
        if trailer.is_empty() {
            return;
        }
        self.raw.push(RawTag::new(
            TagId::Block("Trailer".into()),
            Vec::new(),
            TagValue::Text(format!("{} bytes after end of image", trailer.len())),
        ));
        if sniff(trailer) != ImageFormat::Jpeg {
            return;
        }
        if depth >= MAX_APPENDED_IMAGES {
            log::debug!("JPEG: not opening more than {MAX_APPENDED_IMAGES} appended images");
            return;
        }
        match read_jpeg_at(trailer, depth + 1) {
            Ok((raw, _)) => self.secondary.extend(raw),
            Err(e) => log::debug!("JPEG: unreadable appended image: {e}"),
        }
    }
}

fn read_jpeg(data: &[u8]) -> Result<(Vec<RawTag>, Structure)> {
    read_jpeg_at(data, 0)
}

fn read_jpeg_at(data: &[u8], depth: usize) -> Result<(Vec<RawTag>, Structure)> {
    let parsed = jpeg::parse(data)?;
    let tail = jpeg::scan_tail(data)?;
    let mut structure = Structure::still();
    let mut tags = JpegTags::default();

    for segment in jpeg::header(&parsed) {
        tags.segment(segment.marker(), segment.contents(), &mut structure)?;
    }
    for &(marker, contents) in &tail.segments {
        tags.segment(marker, contents, &mut structure)?;
    }
    tags.trailer(tail.trailer, depth);

    if !tags.icc.is_empty() {
        structure.icc = Some(IccProfile { blocks: tags.icc });
    }
    // Only the primary EXIF segment decides how the image is displayed.
    let mut raw: Vec<RawTag> = tags.secondary.into_iter().filter(|t| t.id != ORIENTATION).collect();
    raw.extend(tags.raw);
    Ok((raw, structure))
}

// ── PNG ─────────────────────────────────────────────────────────────

const PNG_XMP_KEYWORD: &str = "XML:com.adobe.xmp";
const COMPRESSED: &str = "(compressed)";
/// Upper bound on an inflated text chunk.
const MAX_INFLATED: u64 = 16 << 20;

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Split `keyword\0rest`.
fn split_keyword(contents: &[u8]) -> Option<(String, &[u8])> {
    let nul = contents.iter().position(|&b| b == 0)?;
    Some((latin1(&contents[..nul]), &contents[nul + 1..]))
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).take(MAX_INFLATED).read_to_end(&mut out).ok()?;
    Some(out)
}

/// Payload of an ImageMagick raw profile: a name line, a decimal length
/// line, then hex digits wrapped over many lines.
fn raw_profile_payload(text: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(text).ok()?;
    let mut lines = text.trim_start().splitn(3, '\n');
    let _name = lines.next()?;
    let len: usize = lines.next()?.trim().parse().ok()?;
    let digits: String = lines.next()?.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let mut payload = hex::decode(digits).ok()?;
    payload.truncate(len);
    Some(payload)
}

/// Tags inside a hex-encoded EXIF or XMP raw profile.
fn read_raw_profile(kind: &str, text: &[u8], raw: &mut Vec<RawTag>) {
    let Some(payload) = raw_profile_payload(text) else {
        log::debug!("PNG: undecodable raw profile '{kind}'");
        return;
    };
    match kind {
        "exif" | "app1" => match ifd::parse(exif_payload(&payload), ImageFormat::Png, false) {
            Ok(tree) => raw.extend(tree.raw_tags()),
            Err(e) => log::debug!("PNG: raw EXIF profile: {e}"),
        },
        "xmp" => raw.extend(xmp::scan(&payload)),
        _ => {}
    }
}

/// One PNG text entry. `text` is `None` when it could not be inflated.
fn read_text(keyword: String, contents: &[u8], text: Option<&[u8]>, raw: &mut Vec<RawTag>) {
    let lower = keyword.to_ascii_lowercase();
    let value = match (text, lower.strip_prefix(RAW_PROFILE)) {
        (None, _) => COMPRESSED.to_string(),
        (Some(text), Some(kind)) => {
            read_raw_profile(kind.trim(), text, raw);
            format!("({} bytes of hex)", text.len())
        }
        (Some(text), None) => match std::str::from_utf8(text) {
            Ok(s) => s.to_string(),
            Err(_) => latin1(text),
        },
    };
    raw.push(RawTag::new(TagId::Text(keyword), contents.to_vec(), TagValue::Text(value)));
}

fn read_itxt(contents: &[u8], raw: &mut Vec<RawTag>) {
    let Some((keyword, rest)) = split_keyword(contents) else {
        return;
    };
    // compression flag, method, language\0, translated keyword\0, text
    let Some((&compressed, rest)) = rest.split_first() else {
        return;
    };
    let rest = rest.get(1..).unwrap_or_default();
    let mut parts = rest.splitn(3, |&b| b == 0);
    let text = match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(text)) => text,
        _ => &[][..],
    };
    let inflated = if compressed == 0 { None } else { inflate(text) };
    let text = if compressed == 0 { Some(text) } else { inflated.as_deref() };

    if keyword == PNG_XMP_KEYWORD {
        match text {
            Some(packet) => raw.extend(xmp::scan(packet)),
            None => raw.push(block("XMP", contents)),
        }
        return;
    }
    read_text(keyword, contents, text, raw);
}

fn read_png(data: &[u8]) -> Result<(Vec<RawTag>, Structure)> {
    use png::kinds;

    let parsed = png::parse(data)?;
    let mut raw = Vec::new();
    let mut structure = Structure::still();

    for chunk in parsed.chunks() {
        let contents: &[u8] = chunk.contents();
        match chunk.kind() {
            kinds::EXIF => {
                let tree = ifd::parse(exif_payload(contents), ImageFormat::Png, false)?;
                raw.extend(tree.raw_tags());
            }
            kinds::TEXT => {
                if let Some((keyword, text)) = split_keyword(contents) {
                    read_text(keyword, contents, Some(text), &mut raw);
                }
            }
            kinds::ZTXT => {
                if let Some((keyword, rest)) = split_keyword(contents) {
                    // One method byte, then a zlib stream.
                    let text = rest.get(1..).and_then(inflate);
                    read_text(keyword, contents, text.as_deref(), &mut raw);
                }
            }
            kinds::ITXT => read_itxt(contents, &mut raw),
            kinds::TIME if contents.len() >= 7 => {
                let year = u16::from_be_bytes([contents[0], contents[1]]);
                let stamp = format!(
                    "{year:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    contents[2], contents[3], contents[4], contents[5], contents[6]
                );
                raw.push(RawTag::new(TagId::Block("tIME".into()), contents.to_vec(), TagValue::Text(stamp)));
            }
            kinds::ICCP => {
                structure.icc = Some(IccProfile {
                    blocks: vec![contents.to_vec()],
                });
            }
            kinds::PHYS => structure.density = png::phys_density(contents),
            kinds::ACTL if contents.len() >= 4 => {
                structure.animated = true;
                structure.frames =
                    u32::from_be_bytes([contents[0], contents[1], contents[2], contents[3]]).max(1) as usize;
            }
            _ => {}
        }
    }
    Ok((raw, structure))
}

// ── WebP ────────────────────────────────────────────────────────────

fn read_webp(data: &[u8]) -> Result<(Vec<RawTag>, Structure)> {
    use webp::fourcc;

    let chunks = webp::parse(data)?;
    let mut raw = Vec::new();
    let mut structure = Structure::still();
    structure.animated = webp::is_animated(&chunks);
    structure.frames = chunks.iter().filter(|c| c.fourcc == fourcc::ANMF).count().max(1);

    for chunk in &chunks {
        match chunk.fourcc {
            fourcc::EXIF => {
                let tree = ifd::parse(exif_payload(chunk.data), ImageFormat::WebP, false)?;
                raw.extend(tree.raw_tags());
            }
            fourcc::XMP => raw.extend(xmp::scan(chunk.data)),
            fourcc::ICCP => {
                structure.icc = Some(IccProfile {
                    blocks: vec![chunk.data.to_vec()],
                });
            }
            _ => {}
        }
    }
    Ok((raw, structure))
}

// ── TIFF ────────────────────────────────────────────────────────────

fn read_tiff(data: &[u8]) -> Result<(Vec<RawTag>, Structure)> {
    let tree = tiff::parse(data)?;
    let mut raw = tree.raw_tags();
    if let Some(packet) = tree.ifd0.get(tiff::tags::XMP) {
        raw.extend(xmp::scan(&packet.data));
    }

    let structure = Structure {
        frames: tree.page_count(),
        animated: false,
        icc: tree.ifd0.get(tiff::tags::ICC_PROFILE).map(|e| IccProfile {
            blocks: vec![e.data.clone()],
        }),
        density: tiff::density(&tree.ifd0, tree.order),
    };
    Ok((raw, structure))
}

/// Pick the structural blocks that survive a strip under `policy`.
pub fn carry(structure: &Structure, policy: &crate::config::StructurePolicy) -> container::Carry {
    container::Carry {
        icc: structure.icc.clone().filter(|_| policy.keep_icc),
        density: structure.density.filter(|_| policy.keep_dpi),
    }
}
