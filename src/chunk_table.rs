//! Chunk table (spec.md §4.4, §6).
//!
//! Decodes and encodes `table`/`table2` section payloads and assembles the
//! dense, global array mapping chunk number to physical location that the
//! handle looks chunks up in.
//!
//! Wire layout of a `table`/`table2` payload: a 24-byte header (4-byte entry
//! count, 4 reserved, 8-byte base offset, 4 reserved, 4-byte Adler-32 over
//! the preceding 20 bytes), `count` 4-byte entries (MSB = compressed flag,
//! low 31 bits = offset from the base), then a trailing 4-byte Adler-32 over
//! just the entries.

use crate::checksum;
use crate::endian::{read_u32, read_u64, write_u32, write_u64};
use crate::error::{Error, Result};

const HEADER_LEN: usize = 24;
const ENTRY_LEN: usize = 4;
const COMPRESSED_BIT: u32 = 0x8000_0000;
const OFFSET_MASK: u32 = 0x7FFF_FFFF;

/// Per-chunk bookkeeping flags (spec.md's design notes, `libewf_array`
/// replacement section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkFlags {
    pub compressed: bool,
    pub tainted: bool,
    pub from_table2: bool,
}

/// The physical location of one chunk: which segment, where in its
/// `sectors` payload, how many stored bytes, and how it was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub segment: u16,
    pub offset: u64,
    pub length: u32,
    pub flags: ChunkFlags,
}

struct TableHeader {
    count: u32,
    base_offset: u64,
}

fn parse_header(payload: &[u8]) -> Result<TableHeader> {
    if payload.len() < HEADER_LEN {
        return Err(Error::format_invalid("truncated table header"));
    }
    checksum::verify_trailing(&payload[..HEADER_LEN]).map_err(|stored| {
        Error::format_invalid(format!("table header checksum mismatch (stored {stored:#010x})"))
    })?;
    Ok(TableHeader {
        count: read_u32(&payload[0..4]),
        base_offset: read_u64(&payload[8..16]),
    })
}

/// Decodes one `table`/`table2` payload into chunk descriptors, numbered
/// starting at `first_chunk_number` (the caller tracks the running global
/// count). `sectors_payload_len` bounds the last entry's implied length.
pub fn decode_table(
    payload: &[u8],
    segment: u16,
    sectors_payload_len: u64,
    from_table2: bool,
) -> Result<Vec<ChunkDescriptor>> {
    let header = parse_header(payload)?;
    let count = header.count as usize;

    let entries_start = HEADER_LEN;
    let entries_len = count * ENTRY_LEN;
    let entries_end = entries_start + entries_len;
    let trailer_end = entries_end + 4;
    if payload.len() < trailer_end {
        return Err(Error::format_invalid(format!(
            "table declares {count} entries but payload is too short"
        )));
    }

    checksum::verify_trailing(&payload[entries_start..trailer_end]).map_err(|stored| {
        Error::format_invalid(format!(
            "table entry array checksum mismatch (stored {stored:#010x})"
        ))
    })?;

    let mut raw_offsets = Vec::with_capacity(count);
    let mut compressed_flags = Vec::with_capacity(count);
    for i in 0..count {
        let raw = read_u32(&payload[entries_start + i * ENTRY_LEN..][..4]);
        raw_offsets.push((raw & OFFSET_MASK) as u64);
        compressed_flags.push(raw & COMPRESSED_BIT != 0);
    }

    let mut descriptors = Vec::with_capacity(count);
    for i in 0..count {
        let abs_offset = header
            .base_offset
            .checked_add(raw_offsets[i])
            .ok_or_else(|| Error::format_invalid("table entry offset overflows u64"))?;
        let next_abs = if i + 1 < count {
            header
                .base_offset
                .checked_add(raw_offsets[i + 1])
                .ok_or_else(|| Error::format_invalid("table entry offset overflows u64"))?
        } else {
            sectors_payload_len
        };
        let length = next_abs.checked_sub(abs_offset).ok_or_else(|| {
            Error::format_invalid(format!(
                "table entry {i} in segment {segment} is out of order (offset {abs_offset} > next {next_abs})"
            ))
        })?;
        if abs_offset + length > sectors_payload_len {
            return Err(Error::format_invalid(format!(
                "table entry {i} in segment {segment} overruns its sectors section"
            )));
        }
        let length: u32 = length
            .try_into()
            .map_err(|_| Error::format_invalid(format!("table entry {i} stored length exceeds u32")))?;

        descriptors.push(ChunkDescriptor {
            segment,
            offset: abs_offset,
            length,
            flags: ChunkFlags {
                compressed: compressed_flags[i],
                tainted: false,
                from_table2,
            },
        });
    }

    Ok(descriptors)
}

/// Encodes a `table`/`table2` payload from chunk offsets relative to
/// `base_offset`. Every `(offset - base_offset)` must fit in 31 bits; the
/// writer is responsible for starting a fresh table (and thus a fresh base
/// offset) before a segment grows past the 2 GiB a single table can address.
pub fn encode_table(entries: &[(u64, bool)], base_offset: u64) -> Result<Vec<u8>> {
    let mut payload = vec![0u8; HEADER_LEN + entries.len() * ENTRY_LEN + 4];

    write_u32(entries.len() as u32, &mut payload[0..4]);
    write_u64(base_offset, &mut payload[8..16]);
    let header_sum = checksum::adler32(&payload[..20]);
    write_u32(header_sum, &mut payload[20..24]);

    let entries_start = HEADER_LEN;
    for (i, &(offset, compressed)) in entries.iter().enumerate() {
        let relative = offset.checked_sub(base_offset).ok_or_else(|| {
            Error::argument(format!("chunk offset {offset} precedes table base offset {base_offset}"))
        })?;
        if relative > OFFSET_MASK as u64 {
            return Err(Error::argument(format!(
                "chunk offset {relative} relative to base does not fit in 31 bits; start a new table"
            )));
        }
        let mut raw = relative as u32;
        if compressed {
            raw |= COMPRESSED_BIT;
        }
        write_u32(raw, &mut payload[entries_start + i * ENTRY_LEN..][..4]);
    }

    let entries_end = entries_start + entries.len() * ENTRY_LEN;
    let entries_sum = checksum::adler32(&payload[entries_start..entries_end]);
    write_u32(entries_sum, &mut payload[entries_end..entries_end + 4]);

    Ok(payload)
}
