//! Metadata tables (spec.md §3, §4.7): header values, hash values, and the
//! acquisition-error/session range tables. Each sub-module owns one
//! section-tag family's wire format; all of them share the ordered-map /
//! ordered-sequence storage defined here (the target-language replacement
//! for the reference implementation's `libewf_array`-style containers, per
//! spec.md §9).

pub mod error2;
pub mod hash;
pub mod header;
pub mod session;

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// An insertion-ordered string-to-string map, used for both header values
/// and hash values. Re-setting an existing identifier updates its value
/// without moving it in iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedMap {
    order: Vec<String>,
    values: std::collections::HashMap<String, String>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The identifier at insertion-order position `index`.
    pub fn identifier(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.values.get(identifier).map(String::as_str)
    }

    pub fn set(&mut self, identifier: impl Into<String>, value: impl Into<String>) {
        let identifier = identifier.into();
        if !self.values.contains_key(&identifier) {
            self.order.push(identifier.clone());
        }
        self.values.insert(identifier, value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order.iter().map(move |k| (k.as_str(), self.values[k].as_str()))
    }
}

pub(crate) fn inflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(payload);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::format_invalid(format!("failed to inflate metadata section: {e}")))?;
    Ok(out)
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn hex_decode(text: &str, expected_len: usize) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.len() != expected_len * 2 {
        return Err(Error::format_invalid(format!(
            "expected a {}-character hex digest, got {} characters",
            expected_len * 2,
            text.len()
        )));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| Error::format_invalid(format!("invalid hex digit in digest {text:?}")))
        })
        .collect()
}

pub(crate) fn utf16le_to_string(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::format_invalid("UTF-16LE metadata text has an odd byte length"));
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    Ok(String::from_utf16_lossy(&units))
}

pub(crate) fn string_to_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Parses the line-oriented `header`/`header2`/`xheader` table shared shape
/// (spec.md §4.7): digit count line, tab-separated identifiers, tab-separated
/// labels, tab-separated values, a blank line, and a `main`/`srce`/`sub` tag.
/// Tolerant of a missing trailing blank-line/tag pair (some encoders omit
/// it for the last block).
pub(crate) fn parse_table_text(text: &str) -> OrderedMap {
    let mut map = OrderedMap::new();
    let mut lines = text.lines();

    while let Some(count_line) = lines.next() {
        if count_line.trim().is_empty() {
            continue;
        }
        if count_line.trim().parse::<u32>().is_err() {
            break;
        }
        let identifiers = lines.next().unwrap_or_default();
        let _labels = lines.next().unwrap_or_default();
        let values = lines.next().unwrap_or_default();

        let ids: Vec<&str> = identifiers.split('\t').collect();
        let vals: Vec<&str> = values.split('\t').collect();
        for (i, id) in ids.iter().enumerate() {
            if id.is_empty() {
                continue;
            }
            map.set(id.to_string(), vals.get(i).copied().unwrap_or("").to_string());
        }

        // Consume the trailing blank line and tag, if present, before the
        // next block (or end of input).
        match lines.next() {
            Some(l) if l.trim().is_empty() => {
                lines.next();
            }
            _ => {}
        }
    }

    map
}

/// Serializes an [`OrderedMap`] back into the shared table-text shape. The
/// label row mirrors the identifier row: this crate does not retain a
/// separate human-readable label per identifier.
pub(crate) fn render_table_text(map: &OrderedMap) -> String {
    let ids: Vec<&str> = map.iter().map(|(k, _)| k).collect();
    let values: Vec<&str> = map.iter().map(|(_, v)| v).collect();
    format!("1\n{}\n{}\n{}\n\nmain\n", ids.join("\t"), ids.join("\t"), values.join("\t"))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parses the `<identifier>value</identifier>` shape used by `xheader` and
/// `xhash` sections, ignoring the `<?xml ...?>` prolog and the enclosing
/// wrapper tag.
pub(crate) fn parse_xml_like(text: &str) -> OrderedMap {
    let mut map = OrderedMap::new();
    for line in text.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('<') else {
            continue;
        };
        let Some(tag_end) = rest.find('>') else {
            continue;
        };
        let tag = &rest[..tag_end];
        if tag.starts_with('/') || tag.starts_with('?') || tag == "xheader" || tag == "xhash" || tag == "category" {
            continue;
        }
        let after = &rest[tag_end + 1..];
        let close = format!("</{tag}>");
        if let Some(value_end) = after.find(&close) {
            map.set(tag.to_string(), unescape_xml(&after[..value_end]));
        }
    }
    map
}

/// Serializes an [`OrderedMap`] into the `xheader`/`xhash` XML-ish shape.
pub(crate) fn render_xml_like(map: &OrderedMap, wrapper: &str) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<{wrapper}>\n"));
    for (id, value) in map.iter() {
        xml.push_str(&format!("\t<{id}>{}</{id}>\n", escape_xml(value)));
    }
    xml.push_str(&format!("</{wrapper}>\n"));
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let mut map = OrderedMap::new();
        map.set("c", "CASE-1");
        map.set("n", "EV-1");
        map.set("c", "CASE-2");

        assert_eq!(map.identifier(0), Some("c"));
        assert_eq!(map.identifier(1), Some("n"));
        assert_eq!(map.get("c"), Some("CASE-2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn table_text_round_trip() {
        let mut map = OrderedMap::new();
        map.set("c", "CASE-001");
        map.set("a", "Examiner");

        let text = render_table_text(&map);
        let parsed = parse_table_text(&text);
        assert_eq!(parsed.get("c"), Some("CASE-001"));
        assert_eq!(parsed.get("a"), Some("Examiner"));
    }

    #[test]
    fn xml_like_round_trip() {
        let mut map = OrderedMap::new();
        map.set("case_number", "CASE-001");
        map.set("notes", "a <b> & c");

        let xml = render_xml_like(&map, "xheader");
        let parsed = parse_xml_like(&xml);
        assert_eq!(parsed.get("case_number"), Some("CASE-001"));
        assert_eq!(parsed.get("notes"), Some("a <b> & c"));
    }

    #[test]
    fn hex_round_trip() {
        let bytes = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let text = hex_encode(&bytes);
        assert_eq!(text, "deadbeef");
        assert_eq!(hex_decode(&text, 4).unwrap(), bytes);
    }
}
