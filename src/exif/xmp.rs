//! Shallow XMP scanning.
//!
//! XMP packets are not parsed as RDF. The scanner only looks for the
//! properties listed in [`XMP_PROPERTIES`](crate::tags::XMP_PROPERTIES), in
//! either attribute form (`tiff:Make="Canon"`) or element form
//! (`<dc:creator><rdf:Seq><rdf:li>Name</rdf:li></rdf:Seq></dc:creator>`), and
//! reports the first text value it finds.

use crate::tags::{RawTag, TagId, TagValue, XMP_PROPERTIES};

/// Placeholder value for a property whose value could not be pulled out.
const PRESENT: &str = "(present)";

/// Scan an XMP packet. A `Block("XMP")` tag is always reported for a
/// non-empty packet, plus one tag per recognized property.
pub fn scan(packet: &[u8]) -> Vec<RawTag> {
    let text = String::from_utf8_lossy(packet);
    if text.trim_matches(|c: char| c.is_whitespace() || c == '\0').is_empty() {
        return Vec::new();
    }

    let mut out = vec![RawTag::new(
        TagId::Block("XMP".into()),
        packet.to_vec(),
        TagValue::Bytes(packet.to_vec()),
    )];
    for (property, _) in XMP_PROPERTIES {
        if let Some(value) = property_value(&text, property) {
            out.push(RawTag::new(
                TagId::Xmp((*property).to_string()),
                value.as_bytes().to_vec(),
                TagValue::Text(value),
            ));
        }
    }
    out
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn property_value(text: &str, property: &str) -> Option<String> {
    let mut from = 0;
    while let Some(found) = text[from..].find(property) {
        let at = from + found;
        let end = at + property.len();
        from = end;

        if text[end..].chars().next().is_some_and(is_name_char) {
            continue;
        }
        match text[..at].chars().next_back() {
            Some('<') => return Some(element_value(&text[end..], property)),
            Some(c) if c.is_whitespace() => {
                if let Some(value) = attribute_value(&text[end..]) {
                    return Some(value);
                }
            }
            _ => {}
        }
    }
    None
}

fn attribute_value(rest: &str) -> Option<String> {
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|&q| q == '"' || q == '\'')?;
    let body = &rest[1..];
    let close = body.find(quote)?;
    Some(non_empty(unescape(&body[..close])))
}

fn element_value(rest: &str, property: &str) -> String {
    let Some(open_end) = rest.find('>') else {
        return PRESENT.to_string();
    };
    if rest[..open_end].ends_with('/') {
        return PRESENT.to_string();
    }
    let inner = &rest[open_end + 1..];
    let close = format!("</{property}>");
    let inner = &inner[..inner.find(&close).unwrap_or(inner.len())];

    // Text directly inside the element, or else the first text between tags.
    let first = std::iter::once(inner.split('<').next().unwrap_or(""))
        .chain(inner.split('<').skip(1).filter_map(|piece| piece.split_once('>').map(|(_, t)| t)))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or("");
    non_empty(unescape(first))
}

fn non_empty(value: String) -> String {
    if value.is_empty() { PRESENT.to_string() } else { value }
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
