//! Builds the minimal tag set a stripped image may carry.
//!
//! The result starts empty and only ever gains three tags: the capture date,
//! the orientation and an injected copyright. GPS and camera tags have no way
//! in.

use crate::config::RetentionPolicy;
use crate::exif::{ByteOrder, Entry, TiffBuilder};
use crate::tags::{COPYRIGHT, DATE_TIME, DATE_TIME_ORIGINAL, ORIENTATION, TagId, TagSet, TagValue, IfdKind};

/// Select the tags that survive a strip.
///
/// * `DateTimeOriginal` when `keep_date`, falling back to IFD0 `DateTime`.
/// * `Orientation` verbatim when `keep_orientation_tag` (the policy asked for
///   it, or a rebake was needed but could not be done).
/// * `Copyright` when the policy supplies a non-empty string.
pub fn retained_tags(source: &TagSet, policy: &RetentionPolicy, keep_orientation_tag: bool) -> TagSet {
    let mut out = TagSet::new();

    if policy.keep_date {
        let date = [DATE_TIME_ORIGINAL, DATE_TIME]
            .into_iter()
            .find_map(|id| source.get(&id).filter(|t| t.value().as_text().is_some()));
        if let Some(tag) = date {
            out.insert_value(tag.id().clone(), tag.value().clone(), tag.raw().to_vec());
        }
    }

    if keep_orientation_tag {
        if let Some(tag) = source.get(&ORIENTATION) {
            out.insert_value(ORIENTATION, tag.value().clone(), tag.raw().to_vec());
        }
    }

    if let Some(copyright) = policy.copyright() {
        let mut raw = copyright.as_bytes().to_vec();
        raw.push(0);
        out.insert_value(COPYRIGHT, TagValue::Text(copyright.to_string()), raw);
    }

    out
}

/// Lay out a retained tag set as IFD entries in the given byte order.
pub fn exif_builder(retained: &TagSet, order: ByteOrder) -> TiffBuilder {
    let mut builder = TiffBuilder::new(order);

    for tag in retained {
        let TagId::Exif { ifd, code } = *tag.id() else {
            continue;
        };
        let entry = match tag.value() {
            TagValue::Text(s) => Entry::ascii(code, s),
            TagValue::Unsigned(v) if v.iter().all(|&n| n <= u16::MAX as u32) => {
                let shorts: Vec<u16> = v.iter().map(|&n| n as u16).collect();
                Entry::short(code, &shorts, order)
            }
            TagValue::Unsigned(v) => Entry::long(code, v, order),
            other => {
                log::debug!("not serializing {} with value {other:?}", tag.name());
                continue;
            }
        };
        match ifd {
            IfdKind::Primary => builder.ifd0.push(entry),
            IfdKind::Exif => builder.exif.push(entry),
            IfdKind::Gps => builder.gps.push(entry),
            IfdKind::Interop => {}
        }
    }

    builder
}
