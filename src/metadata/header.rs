//! `header`/`header2`/`xheader` section payloads (spec.md §4.7).
//!
//! `header` is plain ASCII text; `header2` is the same line-oriented table
//! deflate-compressed as UTF-16LE; `xheader` is a deflate-compressed UTF-8
//! XML-ish `<identifier>value</identifier>` table. All three parse into the
//! same [`OrderedMap`] of header-value identifiers named in spec.md §4.7 (`c`
//! case number, `n` evidence number, `a` examiner, `e` description, `t`
//! notes, `md` model, `sn` serial, `l` device label, `pid` process
//! identifier, `av` acquiry software version, `ov` acquiry operating
//! system, `m` acquiry date, `u` system date, `p` password hash, `dc`
//! compression level, `ext` extents).

use crate::error::Result;
use crate::metadata::{self, OrderedMap};

pub fn parse_header(payload: &[u8]) -> Result<OrderedMap> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim_end_matches('\0');
    Ok(metadata::parse_table_text(text))
}

pub fn parse_header2(payload: &[u8]) -> Result<OrderedMap> {
    let inflated = metadata::inflate(payload)?;
    let text = metadata::utf16le_to_string(&inflated)?;
    Ok(metadata::parse_table_text(&text))
}

pub fn parse_xheader(payload: &[u8]) -> Result<OrderedMap> {
    let inflated = metadata::inflate(payload)?;
    let text = String::from_utf8_lossy(&inflated).into_owned();
    Ok(metadata::parse_xml_like(&text))
}

pub fn encode_header(map: &OrderedMap) -> Vec<u8> {
    let mut text = metadata::render_table_text(map);
    text.push('\0');
    text.into_bytes()
}

pub fn encode_header2(map: &OrderedMap) -> Result<Vec<u8>> {
    let text = metadata::render_table_text(map);
    metadata::deflate(&metadata::string_to_utf16le(&text))
}

pub fn encode_xheader(map: &OrderedMap) -> Result<Vec<u8>> {
    let xml = metadata::render_xml_like(map, "xheader");
    metadata::deflate(xml.as_bytes())
}
