//! Normalized tag model and the classification table.
//!
//! Every container reader produces [`RawTag`]s. [`classify`] turns them into a
//! [`TagSet`], keeping only identifiers it recognizes and attaching a
//! [`Category`] to each. Anything the table does not know is dropped here and
//! never reaches the rebuilder.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Semantic category of a recognized tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gps,
    Camera,
    Copyright,
    DateTime,
    Orientation,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Gps,
        Category::Camera,
        Category::Copyright,
        Category::DateTime,
        Category::Orientation,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Gps => "GPS",
            Category::Camera => "Camera",
            Category::Copyright => "Copyright",
            Category::DateTime => "DateTime",
            Category::Orientation => "Orientation",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which directory of an EXIF tree an entry was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfdKind {
    /// IFD0 of the EXIF block (or of the TIFF file itself).
    Primary,
    Exif,
    Gps,
    Interop,
}

/// Format-specific tag identifier. Unique within one [`TagSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum TagId {
    /// An EXIF/TIFF IFD entry.
    Exif { ifd: IfdKind, code: u16 },
    /// A PNG `tEXt`/`zTXt`/`iTXt` keyword.
    Text(String),
    /// A property found in an XMP packet, e.g. `dc:creator`.
    Xmp(String),
    /// A whole metadata block with no finer structure (JPEG comment, IPTC, ...).
    Block(String),
}

impl TagId {
    pub const fn exif(ifd: IfdKind, code: u16) -> Self {
        TagId::Exif { ifd, code }
    }
}

/// Decoded value of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Unsigned(Vec<u32>),
    Signed(Vec<i32>),
    Rational(Vec<(u32, u32)>),
    SignedRational(Vec<(i32, i32)>),
    Float(Vec<f64>),
    Bytes(Vec<u8>),
}

impl TagValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn first_unsigned(&self) -> Option<u32> {
        match self {
            TagValue::Unsigned(v) => v.first().copied(),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T>(f: &mut fmt::Formatter<'_>, items: &[T], each: impl Fn(&T) -> String) -> fmt::Result {
            let parts: Vec<String> = items.iter().map(each).collect();
            f.write_str(&parts.join(", "))
        }

        match self {
            TagValue::Text(s) => f.write_str(s),
            TagValue::Unsigned(v) => join(f, v, |n| n.to_string()),
            TagValue::Signed(v) => join(f, v, |n| n.to_string()),
            TagValue::Rational(v) => join(f, v, |(n, d)| format!("{n}/{d}")),
            TagValue::SignedRational(v) => join(f, v, |(n, d)| format!("{n}/{d}")),
            TagValue::Float(v) => join(f, v, |n| n.to_string()),
            TagValue::Bytes(b) if b.len() <= 16 => join(f, b, |n| format!("{n:02x}")),
            TagValue::Bytes(b) => write!(f, "({} bytes)", b.len()),
        }
    }
}

/// An identifier and its value as pulled out of a container, before
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    pub id: TagId,
    pub raw: Vec<u8>,
    pub value: TagValue,
}

impl RawTag {
    pub fn new(id: TagId, raw: Vec<u8>, value: TagValue) -> Self {
        Self { id, raw, value }
    }
}

/// A recognized, classified tag. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    id: TagId,
    category: Category,
    raw: Vec<u8>,
    value: TagValue,
}

impl Tag {
    pub fn id(&self) -> &TagId {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Bytes of the value exactly as stored in the source container.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// Human-readable tag name, e.g. `GPSLatitude` or `Copyright`.
    pub fn name(&self) -> &str {
        match &self.id {
            TagId::Exif { ifd, code } => lookup_exif(*ifd, *code).map(|(n, _)| n).unwrap_or("Unknown"),
            TagId::Text(k) | TagId::Xmp(k) | TagId::Block(k) => k,
        }
    }
}

/// Decimal GPS position, negative for the southern/western hemispheres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Classified tags of one image, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    tags: BTreeMap<TagId, Tag>,
}

pub const ORIENTATION: TagId = TagId::exif(IfdKind::Primary, 0x0112);
pub const DATE_TIME: TagId = TagId::exif(IfdKind::Primary, 0x0132);
pub const DATE_TIME_ORIGINAL: TagId = TagId::exif(IfdKind::Exif, 0x9003);
pub const COPYRIGHT: TagId = TagId::exif(IfdKind::Primary, 0x8298);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any tag with the same id.
    pub fn insert(&mut self, tag: Tag) -> Option<Tag> {
        self.tags.insert(tag.id.clone(), tag)
    }

    /// Build and insert a tag under an id the classifier recognizes.
    /// Returns `false` (and inserts nothing) for unrecognized ids.
    pub fn insert_value(&mut self, id: TagId, value: TagValue, raw: Vec<u8>) -> bool {
        match category_of(&id) {
            Some(category) => {
                self.insert(Tag { id, category, raw, value });
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn contains(&self, id: &TagId) -> bool {
        self.tags.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Tag> {
        self.tags.values().filter(move |t| t.category == category)
    }

    pub fn categories(&self) -> BTreeSet<Category> {
        self.tags.values().map(|t| t.category).collect()
    }

    /// The EXIF orientation value, if present and within 1..=8.
    pub fn orientation(&self) -> Option<u8> {
        let value = self.get(&ORIENTATION)?.value.first_unsigned()?;
        u8::try_from(value).ok().filter(|v| (1..=8).contains(v))
    }

    /// Decimal latitude/longitude from the GPS IFD, when both are present.
    pub fn gps_position(&self) -> Option<GpsPosition> {
        let coord = |value_code: u16, ref_code: u16, negative: char| -> Option<f64> {
            let TagValue::Rational(parts) = &self.get(&TagId::exif(IfdKind::Gps, value_code))?.value
            else {
                return None;
            };
            let decimal = dms_to_decimal(parts)?;
            let reference = self
                .get(&TagId::exif(IfdKind::Gps, ref_code))
                .and_then(|t| t.value.as_text())
                .and_then(|s| s.trim().chars().next());
            Some(if reference == Some(negative) { -decimal } else { decimal })
        };

        Some(GpsPosition {
            latitude: coord(0x0002, 0x0001, 'S')?,
            longitude: coord(0x0004, 0x0003, 'W')?,
        })
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_map::Values<'a, TagId, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.values()
    }
}

/// Convert degrees/minutes/seconds rationals to decimal degrees.
fn dms_to_decimal(parts: &[(u32, u32)]) -> Option<f64> {
    let component = |i: usize| -> f64 {
        match parts.get(i) {
            Some(&(n, d)) if d != 0 => n as f64 / d as f64,
            _ => 0.0,
        }
    };
    let &(_, first_den) = parts.first()?;
    if first_den == 0 {
        return None;
    }
    Some(component(0) + component(1) / 60.0 + component(2) / 3600.0)
}

/// Classify raw container entries into a [`TagSet`].
///
/// Unrecognized identifiers are dropped. When a container repeats an id
/// (e.g. two `tEXt` chunks with the same keyword) the last one wins.
pub fn classify(raw: impl IntoIterator<Item = RawTag>) -> TagSet {
    let mut set = TagSet::new();
    for tag in raw {
        let id = tag.id.clone();
        if !set.insert_value(tag.id, tag.value, tag.raw) {
            log::trace!("dropping unrecognized tag {id:?}");
        }
    }
    set
}

/// Category of an identifier, or `None` if the table does not recognize it.
pub fn category_of(id: &TagId) -> Option<Category> {
    match id {
        TagId::Exif { ifd, code } => lookup_exif(*ifd, *code).map(|(_, c)| c),
        TagId::Text(keyword) => text_keyword_category(keyword),
        TagId::Xmp(property) => XMP_PROPERTIES
            .iter()
            .find(|(p, _)| *p == property)
            .map(|&(_, c)| c),
        TagId::Block(name) => BLOCKS.contains(&name.as_str()).then_some(Category::Other),
    }
}

// ── EXIF lookup ─────────────────────────────────────────────────────

use Category::*;

const PRIMARY_TAGS: &[(u16, &str, Category)] = &[
    (0x010E, "ImageDescription", Other),
    (0x010F, "Make", Camera),
    (0x0110, "Model", Camera),
    (0x0112, "Orientation", Orientation),
    (0x011A, "XResolution", Other),
    (0x011B, "YResolution", Other),
    (0x0128, "ResolutionUnit", Other),
    (0x0131, "Software", Camera),
    (0x0132, "DateTime", DateTime),
    (0x013B, "Artist", Copyright),
    (0x013C, "HostComputer", Camera),
    (0x0213, "YCbCrPositioning", Other),
    (0x02BC, "ApplicationNotes", Other),
    (0x8298, "Copyright", Copyright),
    (0x83BB, "IPTC-NAA", Other),
    (0x8649, "PhotoshopSettings", Other),
    (0x9C9B, "XPTitle", Other),
    (0x9C9C, "XPComment", Other),
    (0x9C9D, "XPAuthor", Copyright),
    (0x9C9E, "XPKeywords", Other),
    (0x9C9F, "XPSubject", Other),
    (0xA431, "BodySerialNumber", Camera),
    (0xC4A5, "PrintImageMatching", Other),
    (0xC614, "UniqueCameraModel", Camera),
    (0xC62F, "CameraSerialNumber", Camera),
];

const EXIF_TAGS: &[(u16, &str, Category)] = &[
    (0x829A, "ExposureTime", Other),
    (0x829D, "FNumber", Other),
    (0x8822, "ExposureProgram", Other),
    (0x8827, "ISOSpeedRatings", Other),
    (0x9000, "ExifVersion", Other),
    (0x9003, "DateTimeOriginal", DateTime),
    (0x9004, "DateTimeDigitized", DateTime),
    (0x9010, "OffsetTime", DateTime),
    (0x9011, "OffsetTimeOriginal", DateTime),
    (0x9012, "OffsetTimeDigitized", DateTime),
    (0x9101, "ComponentsConfiguration", Other),
    (0x9201, "ShutterSpeedValue", Other),
    (0x9202, "ApertureValue", Other),
    (0x9204, "ExposureBiasValue", Other),
    (0x9205, "MaxApertureValue", Other),
    (0x9207, "MeteringMode", Other),
    (0x9208, "LightSource", Other),
    (0x9209, "Flash", Other),
    (0x920A, "FocalLength", Other),
    (0x927C, "MakerNote", Camera),
    (0x9286, "UserComment", Other),
    (0x9290, "SubSecTime", DateTime),
    (0x9291, "SubSecTimeOriginal", DateTime),
    (0x9292, "SubSecTimeDigitized", DateTime),
    (0xA000, "FlashpixVersion", Other),
    (0xA001, "ColorSpace", Other),
    (0xA002, "PixelXDimension", Other),
    (0xA003, "PixelYDimension", Other),
    (0xA217, "SensingMethod", Other),
    (0xA300, "FileSource", Other),
    (0xA301, "SceneType", Other),
    (0xA401, "CustomRendered", Other),
    (0xA402, "ExposureMode", Other),
    (0xA403, "WhiteBalance", Other),
    (0xA404, "DigitalZoomRatio", Other),
    (0xA405, "FocalLengthIn35mmFilm", Other),
    (0xA406, "SceneCaptureType", Other),
    (0xA420, "ImageUniqueID", Camera),
    (0xA430, "CameraOwnerName", Copyright),
    (0xA431, "BodySerialNumber", Camera),
    (0xA432, "LensSpecification", Camera),
    (0xA433, "LensMake", Camera),
    (0xA434, "LensModel", Camera),
    (0xA435, "LensSerialNumber", Camera),
];

const GPS_TAGS: &[(u16, &str)] = &[
    (0x00, "GPSVersionID"),
    (0x01, "GPSLatitudeRef"),
    (0x02, "GPSLatitude"),
    (0x03, "GPSLongitudeRef"),
    (0x04, "GPSLongitude"),
    (0x05, "GPSAltitudeRef"),
    (0x06, "GPSAltitude"),
    (0x07, "GPSTimeStamp"),
    (0x08, "GPSSatellites"),
    (0x09, "GPSStatus"),
    (0x0A, "GPSMeasureMode"),
    (0x0B, "GPSDOP"),
    (0x0C, "GPSSpeedRef"),
    (0x0D, "GPSSpeed"),
    (0x0E, "GPSTrackRef"),
    (0x0F, "GPSTrack"),
    (0x10, "GPSImgDirectionRef"),
    (0x11, "GPSImgDirection"),
    (0x12, "GPSMapDatum"),
    (0x13, "GPSDestLatitudeRef"),
    (0x14, "GPSDestLatitude"),
    (0x15, "GPSDestLongitudeRef"),
    (0x16, "GPSDestLongitude"),
    (0x17, "GPSDestBearingRef"),
    (0x18, "GPSDestBearing"),
    (0x19, "GPSDestDistanceRef"),
    (0x1A, "GPSDestDistance"),
    (0x1B, "GPSProcessingMethod"),
    (0x1C, "GPSAreaInformation"),
    (0x1D, "GPSDateStamp"),
    (0x1E, "GPSDifferential"),
    (0x1F, "GPSHPositioningError"),
];

const INTEROP_TAGS: &[(u16, &str, Category)] = &[
    (0x0001, "InteroperabilityIndex", Other),
    (0x0002, "InteroperabilityVersion", Other),
];

/// Name and category for an IFD entry, if the table knows it.
pub fn lookup_exif(ifd: IfdKind, code: u16) -> Option<(&'static str, Category)> {
    let find = |table: &[(u16, &'static str, Category)]| {
        table.iter().find(|(c, _, _)| *c == code).map(|&(_, n, cat)| (n, cat))
    };
    match ifd {
        IfdKind::Primary => find(PRIMARY_TAGS),
        IfdKind::Exif => find(EXIF_TAGS),
        IfdKind::Interop => find(INTEROP_TAGS),
        IfdKind::Gps => GPS_TAGS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(_, n)| (n, Category::Gps)),
    }
}

// ── Text keywords, XMP properties, blocks ──────────────────────────

fn text_keyword_category(keyword: &str) -> Option<Category> {
    let k = keyword.trim().to_ascii_lowercase();
    let category = match k.as_str() {
        "copyright" | "author" | "artist" | "creator" | "rights" => Copyright,
        "creation time" => DateTime,
        "software" | "source" | "make" | "model" => Camera,
        "title" | "description" | "comment" | "disclaimer" | "warning" | "keywords" | "url" => Other,
        _ => match k.strip_prefix(RAW_PROFILE) {
            Some(kind) => raw_profile_category(kind.trim()),
            None => return None,
        },
    };
    Some(category)
}

/// Keyword prefix ImageMagick uses for hex-encoded profiles in PNG text.
pub const RAW_PROFILE: &str = "raw profile type";

fn raw_profile_category(kind: &str) -> Category {
    match kind {
        "exif" | "app1" | "xmp" => Camera,
        "iptc" | "8bim" => Copyright,
        _ => Other,
    }
}

/// XMP properties the scanner looks for, with their category.
pub const XMP_PROPERTIES: &[(&str, Category)] = &[
    ("exif:GPSLatitude", Gps),
    ("exif:GPSLongitude", Gps),
    ("exif:GPSAltitude", Gps),
    ("exif:GPSTimeStamp", Gps),
    ("exif:GPSVersionID", Gps),
    ("photoshop:City", Gps),
    ("photoshop:State", Gps),
    ("photoshop:Country", Gps),
    ("Iptc4xmpCore:Location", Gps),
    ("tiff:Make", Camera),
    ("tiff:Model", Camera),
    ("aux:SerialNumber", Camera),
    ("aux:Lens", Camera),
    ("exifEX:BodySerialNumber", Camera),
    ("exifEX:LensModel", Camera),
    ("xmp:CreatorTool", Camera),
    ("dc:creator", Copyright),
    ("dc:rights", Copyright),
    ("xmpRights:Owner", Copyright),
    ("xmpRights:UsageTerms", Copyright),
    ("photoshop:Credit", Copyright),
    ("photoshop:AuthorsPosition", Copyright),
    ("Iptc4xmpCore:CreatorContactInfo", Copyright),
    ("exif:DateTimeOriginal", DateTime),
    ("xmp:CreateDate", DateTime),
    ("xmp:ModifyDate", DateTime),
    ("xmp:MetadataDate", DateTime),
    ("photoshop:DateCreated", DateTime),
    ("tiff:Orientation", Orientation),
    ("dc:title", Other),
    ("dc:description", Other),
    ("dc:subject", Other),
];

/// Opaque metadata blocks reported by name.
pub const BLOCKS: &[&str] = &["Comment", "IPTC", "XMP", "Thumbnail", "tIME", "Trailer"];

#[cfg(test)]
mod tests {
    use super::*;

    fn exif(ifd: IfdKind, code: u16, value: TagValue) -> RawTag {
        RawTag::new(TagId::exif(ifd, code), Vec::new(), value)
    }

    fn text(s: &str) -> TagValue {
        TagValue::Text(s.to_string())
    }

    // ── classification ──

    #[test]
    fn classify_maps_known_ids() {
        let set = classify(vec![
            exif(IfdKind::Primary, 0x010F, text("Canon")),
            exif(IfdKind::Primary, 0x0112, TagValue::Unsigned(vec![6])),
            exif(IfdKind::Exif, 0x9003, text("2024:05:01 10:00:00")),
            exif(IfdKind::Gps, 0x0002, TagValue::Rational(vec![(1, 1)])),
            exif(IfdKind::Primary, 0x8298, text("someone")),
            exif(IfdKind::Exif, 0x829A, TagValue::Rational(vec![(1, 250)])),
        ]);

        let cat = |ifd, code| set.get(&TagId::exif(ifd, code)).map(|t| t.category());
        assert_eq!(cat(IfdKind::Primary, 0x010F), Some(Category::Camera));
        assert_eq!(cat(IfdKind::Primary, 0x0112), Some(Category::Orientation));
        assert_eq!(cat(IfdKind::Exif, 0x9003), Some(Category::DateTime));
        assert_eq!(cat(IfdKind::Gps, 0x0002), Some(Category::Gps));
        assert_eq!(cat(IfdKind::Primary, 0x8298), Some(Category::Copyright));
        assert_eq!(cat(IfdKind::Exif, 0x829A), Some(Category::Other));
    }

    #[test]
    fn classify_drops_unrecognized() {
        let set = classify(vec![
            exif(IfdKind::Primary, 0x0100, TagValue::Unsigned(vec![640])),
            exif(IfdKind::Exif, 0xBEEF, TagValue::Bytes(vec![1, 2, 3])),
            RawTag::new(TagId::Text("MyVendorKey".into()), Vec::new(), text("x")),
            RawTag::new(TagId::Xmp("foo:Bar".into()), Vec::new(), text("x")),
            RawTag::new(TagId::Block("APP9".into()), Vec::new(), TagValue::Bytes(vec![])),
        ]);
        assert!(set.is_empty());
    }

    #[test]
    fn gps_ifd_codes_out_of_range_are_dropped() {
        let set = classify(vec![exif(IfdKind::Gps, 0x0100, text("x"))]);
        assert!(set.is_empty());
    }

    #[test]
    fn text_keywords_are_case_insensitive() {
        assert_eq!(category_of(&TagId::Text("Author".into())), Some(Category::Copyright));
        assert_eq!(category_of(&TagId::Text("COPYRIGHT".into())), Some(Category::Copyright));
        assert_eq!(category_of(&TagId::Text("Creation Time".into())), Some(Category::DateTime));
        assert_eq!(category_of(&TagId::Text("Software".into())), Some(Category::Camera));
        assert_eq!(
            category_of(&TagId::Text("Raw profile type exif".into())),
            Some(Category::Camera)
        );
        assert_eq!(
            category_of(&TagId::Text("Raw profile type iptc".into())),
            Some(Category::Copyright)
        );
        assert_eq!(
            category_of(&TagId::Text("Raw profile type icc".into())),
            Some(Category::Other)
        );
    }

    #[test]
    fn blocks_are_other() {
        assert_eq!(category_of(&TagId::Block("IPTC".into())), Some(Category::Other));
        assert_eq!(category_of(&TagId::Block("Comment".into())), Some(Category::Other));
    }

    // ── tag set ──

    #[test]
    fn tagset_keeps_ids_unique() {
        let set = classify(vec![
            RawTag::new(TagId::Text("Author".into()), Vec::new(), text("first")),
            RawTag::new(TagId::Text("Author".into()), Vec::new(), text("second")),
        ]);
        assert_eq!(set.len(), 1);
        let tag = set.get(&TagId::Text("Author".into())).unwrap();
        assert_eq!(tag.value().as_text(), Some("second"));
        assert_eq!(tag.name(), "Author");
    }

    #[test]
    fn orientation_accessor_validates_range() {
        let mut set = classify(vec![exif(IfdKind::Primary, 0x0112, TagValue::Unsigned(vec![3]))]);
        assert_eq!(set.orientation(), Some(3));

        set.insert_value(ORIENTATION, TagValue::Unsigned(vec![9]), Vec::new());
        assert_eq!(set.orientation(), None);
    }

    #[test]
    fn gps_position_decimal_and_signs() {
        let set = classify(vec![
            exif(IfdKind::Gps, 0x0001, text("S")),
            exif(IfdKind::Gps, 0x0002, TagValue::Rational(vec![(33, 1), (52, 1), (1080, 100)])),
            exif(IfdKind::Gps, 0x0003, text("E")),
            exif(IfdKind::Gps, 0x0004, TagValue::Rational(vec![(151, 1), (12, 1), (0, 1)])),
        ]);
        let pos = set.gps_position().unwrap();
        assert!((pos.latitude + 33.869_666).abs() < 1e-4);
        assert!((pos.longitude - 151.2).abs() < 1e-9);
    }

    #[test]
    fn gps_position_needs_both_axes() {
        let set = classify(vec![exif(
            IfdKind::Gps,
            0x0002,
            TagValue::Rational(vec![(10, 1), (0, 1), (0, 1)]),
        )]);
        assert!(set.gps_position().is_none());
    }

    #[test]
    fn categories_collects_distinct() {
        let set = classify(vec![
            exif(IfdKind::Primary, 0x010F, text("Canon")),
            exif(IfdKind::Primary, 0x0110, text("EOS")),
            exif(IfdKind::Primary, 0x0132, text("2024:01:01 00:00:00")),
        ]);
        let cats: Vec<_> = set.categories().into_iter().collect();
        assert_eq!(cats, vec![Category::Camera, Category::DateTime]);
        assert_eq!(set.in_category(Category::Camera).count(), 2);
    }

    #[test]
    fn value_display() {
        assert_eq!(TagValue::Rational(vec![(1, 250), (7, 2)]).to_string(), "1/250, 7/2");
        assert_eq!(TagValue::Unsigned(vec![6]).to_string(), "6");
        assert_eq!(TagValue::Bytes(vec![0x30, 0x32]).to_string(), "30, 32");
        assert_eq!(TagValue::Bytes(vec![0; 40]).to_string(), "(40 bytes)");
    }
}
