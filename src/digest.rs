//! Hash engines consumed as opaque update/finalize objects.
//!
//! The core never implements MD5 or SHA-1 itself; it streams bytes into the
//! RustCrypto `Digest` implementations from the `md-5` and `sha1` crates and
//! reads back the finalized digest when a hash value is needed.

use md5::Digest as _;
use sha1::Digest as _;

/// A running MD5 computation.
#[derive(Default)]
pub struct Md5Engine(md5::Md5);

impl Md5Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finalize(self) -> [u8; 16] {
        self.0.finalize().into()
    }
}

/// A running SHA-1 computation.
#[derive(Default)]
pub struct Sha1Engine(sha1::Sha1);

impl Sha1Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finalize(self) -> [u8; 20] {
        self.0.finalize().into()
    }
}

/// Convenience one-shot MD5 of a full buffer.
pub fn md5(bytes: &[u8]) -> [u8; 16] {
    let mut engine = Md5Engine::new();
    engine.update(bytes);
    engine.finalize()
}

/// Convenience one-shot SHA-1 of a full buffer.
pub fn sha1(bytes: &[u8]) -> [u8; 20] {
    let mut engine = Sha1Engine::new();
    engine.update(bytes);
    engine.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_empty() {
        assert_eq!(
            md5(b""),
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
                0x42, 0x7e,
            ]
        );
    }

    #[test]
    fn sha1_empty() {
        assert_eq!(
            sha1(b""),
            [
                0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60,
                0x18, 0x90, 0xaf, 0xd8, 0x07, 0x09,
            ]
        );
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut engine = Md5Engine::new();
        engine.update(b"hello, ");
        engine.update(b"world");
        assert_eq!(engine.finalize(), md5(b"hello, world"));
    }
}
