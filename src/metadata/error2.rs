//! `error2` section payload: the acquisition-error table (spec.md §3, §6).
//!
//! Wire layout: an 8-byte header (4-byte entry count, 4 reserved) followed
//! by a trailing 4-byte Adler-32 over those 8 bytes, then `count` 8-byte
//! entries (`start_sector` u32 LE, `sector_count` u32 LE), then a trailing
//! 4-byte Adler-32 over the entries.

use crate::checksum;
use crate::endian::{read_u32, write_u32};
use crate::error::{Error, Result};

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 8;

/// A contiguous range of sectors the original acquisition could not read
/// cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    pub start_sector: u64,
    pub sector_count: u64,
}

/// Parses an `error2` (or `session`, which shares this shape) payload into
/// its sector ranges, validating that they are sorted and non-overlapping
/// (spec.md §3's invariant for both tables).
pub fn parse_ranges(payload: &[u8]) -> Result<Vec<SectorRange>> {
    if payload.len() < HEADER_LEN + 4 {
        return Err(Error::format_invalid("truncated acquisition-range table header"));
    }
    checksum::verify_trailing(&payload[..HEADER_LEN + 4]).map_err(|stored| {
        Error::format_invalid(format!(
            "acquisition-range table header checksum mismatch (stored {stored:#010x})"
        ))
    })?;
    let count = read_u32(&payload[0..4]) as usize;

    let entries_start = HEADER_LEN + 4;
    let entries_len = count * ENTRY_LEN;
    let entries_end = entries_start + entries_len;
    let trailer_end = entries_end + 4;
    if payload.len() < trailer_end {
        return Err(Error::format_invalid(format!(
            "acquisition-range table declares {count} entries but payload is too short"
        )));
    }
    checksum::verify_trailing(&payload[entries_start..trailer_end]).map_err(|stored| {
        Error::format_invalid(format!(
            "acquisition-range table entries checksum mismatch (stored {stored:#010x})"
        ))
    })?;

    let mut ranges = Vec::with_capacity(count);
    let mut previous_end: Option<u64> = None;
    for i in 0..count {
        let base = entries_start + i * ENTRY_LEN;
        let start_sector = read_u32(&payload[base..base + 4]) as u64;
        let sector_count = read_u32(&payload[base + 4..base + 8]) as u64;
        if let Some(prev_end) = previous_end {
            if start_sector < prev_end {
                return Err(Error::format_invalid(format!(
                    "acquisition range {i} (start {start_sector}) overlaps the previous range (ends at {prev_end})"
                )));
            }
        }
        previous_end = Some(start_sector + sector_count);
        ranges.push(SectorRange { start_sector, sector_count });
    }

    Ok(ranges)
}

/// Serializes a set of already-sorted, non-overlapping ranges back into the
/// `error2`/`session` wire shape.
pub fn encode_ranges(ranges: &[SectorRange]) -> Result<Vec<u8>> {
    let entries_start = HEADER_LEN + 4;
    let mut payload = vec![0u8; entries_start + ranges.len() * ENTRY_LEN + 4];

    write_u32(ranges.len() as u32, &mut payload[0..4]);
    let header_sum = checksum::adler32(&payload[..HEADER_LEN]);
    write_u32(header_sum, &mut payload[HEADER_LEN..HEADER_LEN + 4]);

    for (i, range) in ranges.iter().enumerate() {
        let base = entries_start + i * ENTRY_LEN;
        let start_sector: u32 = range
            .start_sector
            .try_into()
            .map_err(|_| Error::argument("start_sector exceeds u32 range"))?;
        let sector_count: u32 = range
            .sector_count
            .try_into()
            .map_err(|_| Error::argument("sector_count exceeds u32 range"))?;
        write_u32(start_sector, &mut payload[base..base + 4]);
        write_u32(sector_count, &mut payload[base + 4..base + 8]);
    }

    let entries_end = entries_start + ranges.len() * ENTRY_LEN;
    let entries_sum = checksum::adler32(&payload[entries_start..entries_end]);
    write_u32(entries_sum, &mut payload[entries_end..entries_end + 4]);

    Ok(payload)
}
