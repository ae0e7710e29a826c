//! Media-values store (spec.md §3, §4.5, §6).
//!
//! Parses and serializes the `volume`/`disk` section payload: the fixed
//! record of media geometry every chunk-addressing calculation is rooted in.
//! Three record sizes are recognized, matching the format variants named in
//! spec.md §4.3's filename rule: the EWF1 `volume`/`disk` record (1052
//! bytes), the EWF2 `disk` record (1128 bytes, a handful of reserved bytes
//! wider), and the SMART/EWF-S01 `volume` record (170 bytes, 32-bit sector
//! count only).

use crate::checksum;
use crate::endian::{read_u32, read_u64, write_u32, write_u64};
use crate::error::{Error, Result};

pub const EWF1_RECORD_LEN: usize = 1052;
pub const EWF2_RECORD_LEN: usize = 1128;
pub const SMART_RECORD_LEN: usize = 170;

/// Which on-disk flavour a `volume`/`disk` record was read as, which in turn
/// determines the segment filename alphabet (spec.md §4.3) and the record's
/// wire width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVariant {
    Ewf1,
    Ewf2,
    Smart,
    Logical,
}

/// The acquired medium's type byte, as recorded in the `volume`/`disk`
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Removable,
    Fixed,
    Optical,
    Logical,
    Memory,
    Other(u8),
}

impl MediaType {
    fn from_byte(b: u8) -> Self {
        match b {
            0x00 => MediaType::Removable,
            0x0e => MediaType::Fixed,
            0x0c => MediaType::Optical,
            0x10 => MediaType::Logical,
            0x11 => MediaType::Memory,
            other => MediaType::Other(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            MediaType::Removable => 0x00,
            MediaType::Fixed => 0x0e,
            MediaType::Optical => 0x0c,
            MediaType::Logical => 0x10,
            MediaType::Memory => 0x11,
            MediaType::Other(b) => b,
        }
    }
}

/// Bit flags recorded alongside the media type: physical vs. logical,
/// whether the medium was acquired with a fastbloc write blocker, etc. Kept
/// as an opaque byte; the core does not interpret individual bits beyond
/// round-tripping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaFlags(pub u8);

impl MediaFlags {
    pub const IS_PHYSICAL: u8 = 0x02;
    pub const IS_TAINTED: u8 = 0x04;

    pub fn is_physical(self) -> bool {
        self.0 & Self::IS_PHYSICAL != 0
    }
}

/// Immutable-after-open geometry record (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaValues {
    pub media_type: MediaType,
    pub media_flags: MediaFlags,
    pub number_of_chunks: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub number_of_sectors: u64,
    pub error_granularity: u32,
    pub guid: [u8; 16],
    pub compression_level: u8,
    pub format_variant: FormatVariant,
}

impl MediaValues {
    /// `chunk_size = bytes_per_sector × sectors_per_chunk` (spec.md §3).
    pub fn chunk_size(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_chunk as u64
    }

    /// `media_size = bytes_per_sector × number_of_sectors` (spec.md §3).
    pub fn media_size(&self) -> u64 {
        self.bytes_per_sector as u64 * self.number_of_sectors
    }

    /// Parses a `volume`/`disk` section payload. The variant is inferred
    /// from the payload length.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            SMART_RECORD_LEN => Self::parse_fixed(payload, FormatVariant::Smart, 4),
            EWF1_RECORD_LEN => Self::parse_fixed(payload, FormatVariant::Ewf1, 8),
            EWF2_RECORD_LEN => Self::parse_fixed(payload, FormatVariant::Ewf2, 8),
            other => Err(Error::format_invalid(format!(
                "unrecognized volume/disk record length: {other} bytes"
            ))),
        }
    }

    fn parse_fixed(payload: &[u8], variant: FormatVariant, sector_count_width: usize) -> Result<Self> {
        checksum::verify_trailing(payload).map_err(|stored| {
            Error::format_invalid(format!(
                "volume/disk record checksum mismatch (stored {stored:#010x})"
            ))
        })?;

        let media_type = MediaType::from_byte(payload[0]);
        let number_of_chunks = read_u32(&payload[4..8]);
        let sectors_per_chunk = read_u32(&payload[8..12]);
        let bytes_per_sector = read_u32(&payload[12..16]);
        let number_of_sectors = if sector_count_width == 8 {
            read_u64(&payload[16..24])
        } else {
            read_u32(&payload[16..20]) as u64
        };

        let (error_granularity, guid, compression_level, media_flags) = if sector_count_width == 8 {
            let error_granularity = read_u32(&payload[28..32]);
            let mut guid = [0u8; 16];
            guid.copy_from_slice(&payload[32..48]);
            let compression_level = payload[48];
            let media_flags = MediaFlags(payload[49]);
            (error_granularity, guid, compression_level, media_flags)
        } else {
            let error_granularity = read_u32(&payload[20..24]);
            (error_granularity, [0u8; 16], 0, MediaFlags::default())
        };

        Ok(MediaValues {
            media_type,
            media_flags,
            number_of_chunks,
            sectors_per_chunk,
            bytes_per_sector,
            number_of_sectors,
            error_granularity,
            guid,
            compression_level,
            format_variant: variant,
        })
    }

    /// Serializes this record back to its wire width, as determined by
    /// `self.format_variant`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = match self.format_variant {
            FormatVariant::Smart => SMART_RECORD_LEN,
            FormatVariant::Ewf1 => EWF1_RECORD_LEN,
            FormatVariant::Ewf2 | FormatVariant::Logical => EWF2_RECORD_LEN,
        };
        let mut buf = vec![0u8; len];
        buf[0] = self.media_type.to_byte();
        write_u32(self.number_of_chunks, &mut buf[4..8]);
        write_u32(self.sectors_per_chunk, &mut buf[8..12]);
        write_u32(self.bytes_per_sector, &mut buf[12..16]);

        if matches!(self.format_variant, FormatVariant::Smart) {
            write_u32(self.number_of_sectors as u32, &mut buf[16..20]);
            write_u32(self.error_granularity, &mut buf[20..24]);
        } else {
            write_u64(self.number_of_sectors, &mut buf[16..24]);
            write_u32(self.error_granularity, &mut buf[28..32]);
            buf[32..48].copy_from_slice(&self.guid);
            buf[48] = self.compression_level;
            buf[49] = self.media_flags.0;
        }

        let split = len - 4;
        let sum = checksum::adler32(&buf[..split]);
        write_u32(sum, &mut buf[split..]);
        Ok(buf)
    }
}
