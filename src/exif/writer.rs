//! IFD serializer.
//!
//! Writes fresh TIFF-structured blocks: a minimal EXIF tree for the rebuilt
//! metadata, and the directories of a rewritten TIFF file. Entries are sorted
//! by tag code, values longer than four bytes go into an overflow area right
//! after their IFD, and every offset is word aligned.

use super::ifd::{ByteOrder, Entry, pointer, type_size};

/// Size of a TIFF header.
pub const HEADER_LEN: usize = 8;

/// Entries for a minimal EXIF tree.
#[derive(Debug, Clone)]
pub struct TiffBuilder {
    pub order: ByteOrder,
    pub ifd0: Vec<Entry>,
    pub exif: Vec<Entry>,
    pub gps: Vec<Entry>,
}

impl TiffBuilder {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            ifd0: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ifd0.is_empty() && self.exif.is_empty() && self.gps.is_empty()
    }
}

fn padded(len: usize) -> usize {
    len + (len & 1)
}

fn value_len(entry: &Entry) -> usize {
    // Trust the data length; field type only matters for the header.
    debug_assert!(type_size(entry.field_type).is_some());
    entry.data.len()
}

/// Serialized size of an IFD including its overflow values.
pub fn ifd_len(entries: &[Entry]) -> usize {
    let overflow: usize = entries
        .iter()
        .map(value_len)
        .filter(|&len| len > 4)
        .map(padded)
        .sum();
    2 + entries.len() * 12 + 4 + overflow
}

/// Append an IFD to `out`. The IFD's offset is `out.len()` at the time of the
/// call, so `out` must hold the stream from its TIFF header onward.
pub fn write_ifd(out: &mut Vec<u8>, order: ByteOrder, entries: &[Entry], next: u32) {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.code);

    if out.len() % 2 == 1 {
        out.push(0);
    }
    let start = out.len();
    let mut overflow_offset = start + 2 + sorted.len() * 12 + 4;
    let mut overflow = Vec::new();

    order.put_u16(out, sorted.len() as u16);
    for entry in &sorted {
        order.put_u16(out, entry.code);
        order.put_u16(out, entry.field_type);
        order.put_u32(out, entry.count);

        let len = value_len(entry);
        if len <= 4 {
            let mut inline = entry.data.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            order.put_u32(out, overflow_offset as u32);
            overflow.extend_from_slice(&entry.data);
            if len % 2 == 1 {
                overflow.push(0);
            }
            overflow_offset += padded(len);
        }
    }
    order.put_u32(out, next);
    out.extend_from_slice(&overflow);
}

/// Append a TIFF header pointing at an IFD0 right after it.
pub fn write_header(out: &mut Vec<u8>, order: ByteOrder) {
    out.extend_from_slice(&order.marker());
    order.put_u16(out, 42);
    order.put_u32(out, HEADER_LEN as u32);
}

/// Serialize a minimal EXIF tree: IFD0, then the Exif and GPS sub-IFDs when
/// they have entries. Pointer tags are added here, never by callers.
pub fn encode_exif(builder: &TiffBuilder) -> Vec<u8> {
    let order = builder.order;
    let mut ifd0: Vec<Entry> = builder
        .ifd0
        .iter()
        .filter(|e| !matches!(e.code, pointer::EXIF | pointer::GPS))
        .cloned()
        .collect();

    // Placeholders first so the IFD0 size is final before offsets are known.
    if !builder.exif.is_empty() {
        ifd0.push(Entry::long(pointer::EXIF, &[0], order));
    }
    if !builder.gps.is_empty() {
        ifd0.push(Entry::long(pointer::GPS, &[0], order));
    }

    let exif_offset = HEADER_LEN + padded(ifd_len(&ifd0));
    let exif_len = if builder.exif.is_empty() {
        0
    } else {
        padded(ifd_len(&builder.exif))
    };
    let gps_offset = exif_offset + exif_len;

    for entry in ifd0.iter_mut() {
        match entry.code {
            pointer::EXIF => *entry = Entry::long(pointer::EXIF, &[exif_offset as u32], order),
            pointer::GPS => *entry = Entry::long(pointer::GPS, &[gps_offset as u32], order),
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(gps_offset + ifd_len(&builder.gps));
    write_header(&mut out, order);
    write_ifd(&mut out, order, &ifd0, 0);
    if !builder.exif.is_empty() {
        write_ifd(&mut out, order, &builder.exif, 0);
    }
    if !builder.gps.is_empty() {
        write_ifd(&mut out, order, &builder.gps, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::ifd::{field, parse};
    use crate::format::ImageFormat;

    #[test]
    fn ifd_len_counts_overflow_padded() {
        let order = ByteOrder::Little;
        let entries = vec![
            Entry::short(0x0112, &[1], order),
            Entry::ascii(0x8298, "abcd"), // 5 bytes with NUL, padded to 6
        ];
        assert_eq!(ifd_len(&entries), 2 + 24 + 4 + 6);
    }

    #[test]
    fn entries_are_sorted_and_offsets_resolve() {
        let mut builder = TiffBuilder::new(ByteOrder::Little);
        builder.ifd0.push(Entry::ascii(0x8298, "© forfaxx"));
        builder.ifd0.push(Entry::short(0x0112, &[3], ByteOrder::Little));
        builder.exif.push(Entry::ascii(0x9003, "2020:01:02 03:04:05"));

        let data = encode_exif(&builder);
        let tree = parse(&data, ImageFormat::Jpeg, false).unwrap();

        let codes: Vec<u16> = tree.ifd0.entries.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![0x0112, 0x8298, pointer::EXIF]);
        assert_eq!(
            tree.ifd0.get(0x8298).unwrap().decode(tree.order).to_string(),
            "© forfaxx"
        );
        let exif = tree.exif.unwrap();
        assert_eq!(exif.offset % 2, 0);
        assert_eq!(exif.get(0x9003).unwrap().field_type, field::ASCII);
        assert!(tree.gps.is_none());
    }

    #[test]
    fn big_endian_round_trips_short() {
        let mut builder = TiffBuilder::new(ByteOrder::Big);
        builder.ifd0.push(Entry::short(0x0112, &[8], ByteOrder::Big));
        let data = encode_exif(&builder);
        assert_eq!(&data[..4], b"MM\x00\x2A");

        let tree = parse(&data, ImageFormat::Tiff, false).unwrap();
        assert_eq!(tree.ifd0.get(0x0112).unwrap().first_unsigned(ByteOrder::Big), Some(8));
    }

    #[test]
    fn caller_pointers_are_replaced() {
        let mut builder = TiffBuilder::new(ByteOrder::Little);
        builder.ifd0.push(Entry::long(pointer::EXIF, &[9999], ByteOrder::Little));
        let data = encode_exif(&builder);
        let tree = parse(&data, ImageFormat::Jpeg, false).unwrap();
        assert!(tree.ifd0.entries.is_empty());
        assert!(tree.exif.is_none());
    }
}
