//! Adler-32 checksum helpers.
//!
//! Every integrity field in the EWF wire format except the MD5/SHA-1 hash
//! sections is an Adler-32 (RFC 1950, modulus 65521, initial value 1) over
//! exactly the region named by the caller. This module wraps the `adler32`
//! crate rather than hand-rolling the algorithm.

use adler32::RollingAdler32;

/// Computes the Adler-32 checksum of `data`.
pub fn adler32(data: &[u8]) -> u32 {
    RollingAdler32::from_buffer(data).hash()
}

/// Verifies that the trailing 4 little-endian bytes of `region` equal the
/// Adler-32 checksum of the bytes preceding them.
///
/// Returns `Ok(())` on match, `Err(stored)` with the stored value otherwise.
pub fn verify_trailing(region: &[u8]) -> Result<(), u32> {
    debug_assert!(region.len() >= 4);
    let split = region.len() - 4;
    let stored = crate::endian::read_u32(&region[split..]);
    let computed = adler32(&region[..split]);
    if stored == computed {
        Ok(())
    } else {
        Err(stored)
    }
}
