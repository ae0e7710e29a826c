//! Section reader/writer (spec.md §4.2).
//!
//! Every section begins with a 76-byte descriptor: a 16-byte ASCII type tag,
//! an 8-byte little-endian next-section file offset, an 8-byte little-endian
//! total section size (the descriptor itself included), 40 reserved bytes,
//! and a trailing Adler-32 over the preceding 72 bytes. Unknown tags are
//! skipped via the next-offset pointer; the payload is opaque to this
//! module and interpreted by the typed parsers in `media`, `chunk_table`,
//! `metadata` and friends.

use crate::checksum;
use crate::endian::{read_u64, write_u64};
use crate::error::{Error, Result};

/// Size of the fixed section descriptor, in bytes.
pub const DESCRIPTOR_LEN: u64 = 76;

/// The section types the reader recognizes by tag, grouped as in spec.md
/// §4.2. `Unknown` sections are retained with their raw tag text so callers
/// can log what was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionTag {
    Header,
    Header2,
    Xheader,
    Volume,
    Disk,
    Data,
    Table,
    Table2,
    Sectors,
    Hash,
    Digest,
    Xhash,
    Error2,
    Session,
    Ltree,
    Next,
    Done,
    RestartData,
    Unknown,
}

impl SectionTag {
    fn from_text(text: &str) -> Self {
        match text {
            "header" => SectionTag::Header,
            "header2" => SectionTag::Header2,
            "xheader" => SectionTag::Xheader,
            "volume" => SectionTag::Volume,
            "disk" => SectionTag::Disk,
            "data" => SectionTag::Data,
            "table" => SectionTag::Table,
            "table2" => SectionTag::Table2,
            "sectors" => SectionTag::Sectors,
            "hash" => SectionTag::Hash,
            "digest" => SectionTag::Digest,
            "xhash" => SectionTag::Xhash,
            "error2" => SectionTag::Error2,
            "session" => SectionTag::Session,
            "ltree" => SectionTag::Ltree,
            "next" => SectionTag::Next,
            "done" => SectionTag::Done,
            "restart data" => SectionTag::RestartData,
            _ => SectionTag::Unknown,
        }
    }

    /// Whether a section with this tag ends a segment's section chain.
    pub fn is_chain_terminal(self) -> bool {
        matches!(self, SectionTag::Next | SectionTag::Done)
    }
}

fn ascii_tag_text(raw: &[u8; 16]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(16);
    String::from_utf8_lossy(&raw[..len]).into_owned()
}

fn pack_tag(name: &str) -> Result<[u8; 16]> {
    if name.len() > 16 {
        return Err(Error::argument(format!(
            "section tag {name:?} is longer than 16 bytes"
        )));
    }
    let mut raw = [0u8; 16];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    Ok(raw)
}

/// A parsed section descriptor plus the file offset it was read from.
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    pub tag: SectionTag,
    pub tag_text: String,
    /// File offset of the start of this descriptor.
    pub offset: u64,
    /// File offset of the next section's descriptor (meaningless for `done`).
    pub next_offset: u64,
    /// Total size of this section, descriptor included.
    pub size: u64,
}

impl SectionDescriptor {
    /// File offset at which this section's payload begins.
    pub fn payload_offset(&self) -> u64 {
        self.offset + DESCRIPTOR_LEN
    }

    /// Length of this section's payload (total size minus the descriptor).
    pub fn payload_len(&self) -> Result<u64> {
        self.size.checked_sub(DESCRIPTOR_LEN).ok_or_else(|| {
            Error::format_invalid(format!(
                "section at offset {} has size {} smaller than its descriptor",
                self.offset, self.size
            ))
        })
    }

    /// Parses a 76-byte descriptor from the start of `raw`, which is
    /// expected to start exactly at file offset `offset`.
    pub fn parse(raw: &[u8], offset: u64) -> Result<Self> {
        if raw.len() < DESCRIPTOR_LEN as usize {
            return Err(Error::format_invalid(format!(
                "truncated section descriptor at offset {offset}"
            )));
        }
        let descriptor_bytes = &raw[..DESCRIPTOR_LEN as usize];
        checksum::verify_trailing(descriptor_bytes).map_err(|stored| {
            Error::format_invalid(format!(
                "section descriptor at offset {offset} failed its checksum (stored {stored:#010x})"
            ))
        })?;

        let mut tag_raw = [0u8; 16];
        tag_raw.copy_from_slice(&descriptor_bytes[0..16]);
        let tag_text = ascii_tag_text(&tag_raw);
        let tag = SectionTag::from_text(&tag_text);

        let next_offset = read_u64(&descriptor_bytes[16..24]);
        let size = read_u64(&descriptor_bytes[24..32]);

        Ok(SectionDescriptor {
            tag,
            tag_text,
            offset,
            next_offset,
            size,
        })
    }

    /// Extracts this section's payload from the full raw segment bytes.
    pub fn payload<'a>(&self, raw: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.payload_offset() as usize;
        let len = self.payload_len()? as usize;
        raw.get(start..start + len).ok_or_else(|| {
            Error::format_invalid(format!(
                "section {:?} at offset {} overruns the segment ({} bytes available)",
                self.tag_text,
                self.offset,
                raw.len().saturating_sub(start)
            ))
        })
    }

    /// Encodes a descriptor (tag, next-offset, total size), computing and
    /// appending the trailing Adler-32. The 40 reserved bytes are zeroed.
    pub fn encode(tag_name: &str, next_offset: u64, size: u64) -> Result<[u8; DESCRIPTOR_LEN as usize]> {
        let mut buf = [0u8; DESCRIPTOR_LEN as usize];
        buf[0..16].copy_from_slice(&pack_tag(tag_name)?);
        write_u64(next_offset, &mut buf[16..24]);
        write_u64(size, &mut buf[24..32]);
        let sum = checksum::adler32(&buf[..72]);
        crate::endian::write_u32(sum, &mut buf[72..76]);
        Ok(buf)
    }
}

/// Walks a segment's section chain starting at `start` (file offset 13 for
/// the first section of a segment), returning descriptors in file order.
/// The walk stops, inclusively, at the first `next` or `done` section.
pub fn read_chain(raw: &[u8], start: u64) -> Result<Vec<SectionDescriptor>> {
    let mut chain = Vec::new();
    let mut offset = start;

    loop {
        let at = offset as usize;
        let window = raw.get(at..).ok_or_else(|| {
            Error::format_invalid(format!("section descriptor at offset {offset} is past the end of the segment"))
        })?;
        let descriptor = SectionDescriptor::parse(window, offset)?;

        if descriptor.size < DESCRIPTOR_LEN {
            return Err(Error::format_invalid(format!(
                "section at offset {offset} declares size {} smaller than the descriptor",
                descriptor.size
            )));
        }
        let end = offset
            .checked_add(descriptor.size)
            .ok_or_else(|| Error::format_invalid(format!("section at offset {offset} overflows its end offset")))?;
        if end as usize > raw.len() {
            return Err(Error::format_invalid(format!(
                "section {:?} at offset {offset} extends past the end of the segment",
                descriptor.tag_text
            )));
        }

        let terminal = descriptor.tag.is_chain_terminal();
        let next_offset = descriptor.next_offset;
        chain.push(descriptor);
        if terminal {
            break;
        }
        if next_offset <= offset {
            return Err(Error::format_invalid(format!(
                "section chain is not strictly increasing at offset {offset} (next = {next_offset})"
            )));
        }
        offset = next_offset;
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_section(tag: &str, payload: &[u8], next_offset: u64, offset: u64) -> Vec<u8> {
        let size = DESCRIPTOR_LEN + payload.len() as u64;
        let descriptor = SectionDescriptor::encode(tag, next_offset, size).unwrap();
        let mut out = descriptor.to_vec();
        out.extend_from_slice(payload);
        let _ = offset;
        out
    }

    #[test]
    fn encode_parse_round_trip() {
        let raw = build_section("volume", &[0xAB; 16], 0, 0);
        let descriptor = SectionDescriptor::parse(&raw, 0).unwrap();
        assert_eq!(descriptor.tag, SectionTag::Volume);
        assert_eq!(descriptor.tag_text, "volume");
        assert_eq!(descriptor.payload(&raw).unwrap(), &[0xAB; 16][..]);
    }

    #[test]
    fn checksum_mismatch_is_format_invalid() {
        let mut raw = build_section("done", &[], 0, 0);
        raw[72] ^= 0xFF;
        let err = SectionDescriptor::parse(&raw, 0).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }

    #[test]
    fn unknown_tag_is_preserved_for_logging() {
        let raw = build_section("ltree", &[], 100, 0);
        let descriptor = SectionDescriptor::parse(&raw, 0).unwrap();
        assert_eq!(descriptor.tag, SectionTag::Ltree);

        let raw = build_section("foobarbaz", &[], 100, 0);
        let descriptor = SectionDescriptor::parse(&raw, 0).unwrap();
        assert_eq!(descriptor.tag, SectionTag::Unknown);
        assert_eq!(descriptor.tag_text, "foobarbaz");
    }

    #[test]
    fn chain_walk_stops_at_done() {
        let mut raw = Vec::new();
        let header = build_section("header", b"hello", DESCRIPTOR_LEN + 5, 0);
        raw.extend_from_slice(&header);
        let done_offset = raw.len() as u64;
        let done = build_section("done", &[], 0, done_offset);
        raw.extend_from_slice(&done);

        let chain = read_chain(&raw, 0).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].tag, SectionTag::Header);
        assert_eq!(chain[1].tag, SectionTag::Done);
    }

    #[test]
    fn chain_walk_rejects_non_increasing_offsets() {
        let raw = build_section("header", b"x", 0, 0);
        let err = read_chain(&raw, 0).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }

    #[test]
    fn chain_walk_rejects_overrun() {
        let mut descriptor = SectionDescriptor::encode("header", 0, 9999).unwrap().to_vec();
        descriptor.extend_from_slice(b"short");
        let err = read_chain(&descriptor, 0).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }
}
