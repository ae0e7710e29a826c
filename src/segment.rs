//! Segment-file container (spec.md §4.3).
//!
//! Parses/emits the fixed 8-byte signature and 5-byte segment header that
//! open every segment file, and walks the section chain that follows
//! starting at file offset 13.

use crate::endian::{read_u16, write_u16};
use crate::error::{Error, Result};
use crate::section::{self, SectionDescriptor};

pub const SIGNATURE_LEN: usize = 8;
pub const HEADER_LEN: usize = 5;
/// File offset of the first section descriptor in every segment.
pub const FIRST_SECTION_OFFSET: u64 = (SIGNATURE_LEN + HEADER_LEN) as u64;

const EWF1_SIGNATURE: [u8; 8] = [0x45, 0x56, 0x46, 0x09, 0x0D, 0x0A, 0xFF, 0x00];
const LOGICAL_EWF1_SIGNATURE: [u8; 8] = [0x4C, 0x56, 0x46, 0x09, 0x0D, 0x0A, 0xFF, 0x00];
const EWF2_SIGNATURE: [u8; 8] = [0x45, 0x56, 0x46, 0x32, 0x0D, 0x0A, 0x81, 0x00];

/// Which signature a segment file opened with, determining the naming
/// scheme and volume/disk record width (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Ewf1,
    LogicalEwf1,
    Ewf2,
}

/// The fixed 5-byte segment header following the 8-byte signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub signature: SignatureKind,
    pub segment_type: u8,
    pub segment_number: u16,
}

impl SegmentHeader {
    /// Parses the 13-byte signature + header from the start of a segment
    /// file's raw bytes.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < FIRST_SECTION_OFFSET as usize {
            return Err(Error::format_invalid("segment file is shorter than its signature and header"));
        }
        let signature = match &raw[0..SIGNATURE_LEN] {
            s if s == EWF1_SIGNATURE => SignatureKind::Ewf1,
            s if s == LOGICAL_EWF1_SIGNATURE => SignatureKind::LogicalEwf1,
            s if s == EWF2_SIGNATURE => SignatureKind::Ewf2,
            _ => return Err(Error::format_invalid("unrecognized segment file signature")),
        };
        let segment_type = raw[8];
        let segment_number = read_u16(&raw[9..11]);
        Ok(SegmentHeader {
            signature,
            segment_type,
            segment_number,
        })
    }

    /// Serializes the 13-byte signature + header.
    pub fn encode(&self) -> [u8; FIRST_SECTION_OFFSET as usize] {
        let mut buf = [0u8; FIRST_SECTION_OFFSET as usize];
        let signature = match self.signature {
            SignatureKind::Ewf1 => EWF1_SIGNATURE,
            SignatureKind::LogicalEwf1 => LOGICAL_EWF1_SIGNATURE,
            SignatureKind::Ewf2 => EWF2_SIGNATURE,
        };
        buf[0..SIGNATURE_LEN].copy_from_slice(&signature);
        buf[8] = self.segment_type;
        write_u16(self.segment_number, &mut buf[9..11]);
        buf
    }
}

/// Parses a whole segment file's raw bytes into its header and ordered
/// section chain.
pub fn parse_segment(raw: &[u8]) -> Result<(SegmentHeader, Vec<SectionDescriptor>)> {
    let header = SegmentHeader::parse(raw)?;
    let chain = section::read_chain(raw, FIRST_SECTION_OFFSET)?;
    Ok((header, chain))
}

/// Fails if `header` does not declare the segment number the opening order
/// requires (spec.md §4.3: "segment N of an image is present iff segments
/// 1…N−1 are present").
pub fn validate_segment_number(header: &SegmentHeader, expected: u16) -> Result<()> {
    if header.segment_number != expected {
        return Err(Error::format_invalid(format!(
            "segment header declares number {}, expected {expected}",
            header.segment_number
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{SectionDescriptor, SectionTag};

    #[test]
    fn header_round_trip() {
        let header = SegmentHeader {
            signature: SignatureKind::Ewf1,
            segment_type: 1,
            segment_number: 3,
        };
        let raw = header.encode();
        assert_eq!(SegmentHeader::parse(&raw).unwrap(), header);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut raw = [0u8; 13];
        raw[0..8].copy_from_slice(b"NOTREAL\0");
        let err = SegmentHeader::parse(&raw).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }

    #[test]
    fn parses_full_segment_with_section_chain() {
        let header = SegmentHeader {
            signature: SignatureKind::Ewf1,
            segment_type: 1,
            segment_number: 1,
        };
        let mut raw = header.encode().to_vec();

        let done_offset = raw.len() as u64;
        let done = SectionDescriptor::encode("done", 0, section::DESCRIPTOR_LEN).unwrap();
        raw.extend_from_slice(&done);
        let _ = done_offset;

        let (parsed_header, chain) = parse_segment(&raw).unwrap();
        assert_eq!(parsed_header.segment_number, 1);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].tag, SectionTag::Done);
    }

    #[test]
    fn segment_number_validation() {
        let header = SegmentHeader {
            signature: SignatureKind::Ewf1,
            segment_type: 1,
            segment_number: 2,
        };
        assert!(validate_segment_number(&header, 2).is_ok());
        assert!(validate_segment_number(&header, 1).is_err());
    }
}
