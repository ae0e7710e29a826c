//! Chunk codec: compression, decompression, empty-block detection, and
//! checksum attach/verify (spec.md §4.5).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::checksum;
use crate::empty_block::is_empty_block;
use crate::error::{Error, Result};

/// The deflate effort configured for write mode (spec.md's `WriteOptions`,
/// SPEC_FULL.md §A "Configuration").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Never deflate; every chunk is stored raw plus its checksum.
    None,
    Fast,
    Best,
}

impl CompressionLevel {
    fn to_flate2(self) -> Option<Compression> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Fast => Some(Compression::fast()),
            CompressionLevel::Best => Some(Compression::best()),
        }
    }
}

/// Runs the write-mode encoding pipeline on one chunk's plaintext, returning
/// `(stored_bytes, compressed)`.
///
/// 1. If empty-block detection is enabled and the chunk is a single repeated
///    byte, deflate it (which collapses a repeated-byte run to a handful of
///    bytes) and mark it compressed.
/// 2. Otherwise, if `level` deflates, use the deflated bytes when they are
///    smaller than the raw chunk plus its trailing checksum; fall back to
///    raw otherwise.
/// 3. Raw chunks get a trailing Adler-32 over the plaintext appended.
pub fn encode_chunk(
    plaintext: &[u8],
    level: CompressionLevel,
    empty_block_detection: bool,
) -> Result<(Vec<u8>, bool)> {
    if empty_block_detection && !plaintext.is_empty() && is_empty_block(plaintext) {
        let stored = deflate(plaintext, Compression::best())?;
        return Ok((stored, true));
    }

    if let Some(flate_level) = level.to_flate2() {
        let stored = deflate(plaintext, flate_level)?;
        if stored.len() < plaintext.len() + 4 {
            return Ok((stored, true));
        }
    }

    let mut stored = Vec::with_capacity(plaintext.len() + 4);
    stored.extend_from_slice(plaintext);
    stored.extend_from_slice(&checksum::adler32(plaintext).to_le_bytes());
    Ok((stored, false))
}

/// Runs the read-mode decoding pipeline on one stored chunk.
///
/// `expected_len` is the chunk size from media values (the plaintext size
/// of every non-terminal chunk, or the remainder for the last one); the
/// decompressed result must not exceed it.
pub fn decode_chunk(stored: &[u8], compressed: bool, expected_len: usize) -> Result<Vec<u8>> {
    if compressed {
        let mut decoder = ZlibDecoder::new(stored);
        let mut plaintext = Vec::with_capacity(expected_len);
        decoder
            .read_to_end(&mut plaintext)
            .map_err(|e| Error::IntegrityMismatch(format!("chunk failed to inflate: {e}")))?;
        if plaintext.len() != expected_len {
            return Err(Error::IntegrityMismatch(format!(
                "decompressed chunk is {} bytes, expected exactly {expected_len}",
                plaintext.len()
            )));
        }
        Ok(plaintext)
    } else {
        if stored.len() < 4 {
            return Err(Error::format_invalid("uncompressed chunk shorter than its trailing checksum"));
        }
        checksum::verify_trailing(stored).map_err(|stored_sum| {
            Error::IntegrityMismatch(format!("chunk checksum mismatch (stored {stored_sum:#010x})"))
        })?;
        let plaintext = &stored[..stored.len() - 4];
        if plaintext.len() != expected_len {
            return Err(Error::IntegrityMismatch(format!(
                "uncompressed chunk is {} bytes, expected exactly {expected_len}",
                plaintext.len()
            )));
        }
        Ok(plaintext.to_vec())
    }
}

fn deflate(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_arbitrary_bytes() {
        let plaintext: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let (stored, compressed) = encode_chunk(&plaintext, CompressionLevel::Best, false).unwrap();
        let decoded = decode_chunk(&stored, compressed, plaintext.len()).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn round_trip_empty_block() {
        let plaintext = vec![0xAAu8; 8192];
        let (stored, compressed) = encode_chunk(&plaintext, CompressionLevel::None, true).unwrap();
        assert!(compressed);
        assert!(stored.len() < plaintext.len() / 4);
        let decoded = decode_chunk(&stored, compressed, plaintext.len()).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn no_compression_level_always_stores_raw() {
        let plaintext = vec![0x00u8; 1024];
        let (stored, compressed) = encode_chunk(&plaintext, CompressionLevel::None, false).unwrap();
        assert!(!compressed);
        assert_eq!(stored.len(), plaintext.len() + 4);
    }

    #[test]
    fn incompressible_data_falls_back_to_raw() {
        // Pseudo-random bytes via a tiny xorshift; deflate cannot shrink this.
        let mut state = 0x2545F4914F6CDD1Du64;
        let plaintext: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state & 0xFF) as u8
            })
            .collect();
        let (stored, compressed) = encode_chunk(&plaintext, CompressionLevel::Best, false).unwrap();
        assert!(!compressed);
        assert_eq!(stored.len(), plaintext.len() + 4);
    }

    #[test]
    fn corrupted_raw_checksum_is_integrity_mismatch() {
        let plaintext = vec![0x11u8; 64];
        let (mut stored, compressed) = encode_chunk(&plaintext, CompressionLevel::None, false).unwrap();
        *stored.last_mut().unwrap() ^= 0xFF;
        let err = decode_chunk(&stored, compressed, plaintext.len()).unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch(_)));
    }

    #[test]
    fn corrupted_compressed_stream_is_integrity_mismatch() {
        let plaintext = vec![0xABu8; 8192];
        let (mut stored, compressed) = encode_chunk(&plaintext, CompressionLevel::None, true).unwrap();
        assert!(compressed);
        let mid = stored.len() / 2;
        stored[mid] ^= 0xFF;
        assert!(decode_chunk(&stored, compressed, plaintext.len()).is_err());
    }
}
