//! `hash`/`digest`/`xhash` section payloads (spec.md §4.7, §6).
//!
//! `hash` is a fixed 36-byte record (16-byte MD5, 16 reserved, trailing
//! Adler-32); `digest` is 80 bytes (16-byte MD5, 20-byte SHA-1, 40 reserved,
//! trailing Adler-32); `xhash` is a deflate-compressed UTF-8 XML-ish table,
//! parsed the same way as `xheader`. All three populate the same
//! [`OrderedMap`], keyed `"MD5"`/`"SHA1"` for the fixed-width records.

use crate::checksum;
use crate::error::{Error, Result};
use crate::metadata::{self, OrderedMap};

const HASH_RECORD_LEN: usize = 36;
const DIGEST_RECORD_LEN: usize = 80;

pub fn parse_hash(payload: &[u8]) -> Result<OrderedMap> {
    if payload.len() != HASH_RECORD_LEN {
        return Err(Error::format_invalid(format!(
            "hash record is {} bytes, expected {HASH_RECORD_LEN}",
            payload.len()
        )));
    }
    checksum::verify_trailing(payload).map_err(|stored| {
        Error::format_invalid(format!("hash record checksum mismatch (stored {stored:#010x})"))
    })?;
    let mut map = OrderedMap::new();
    map.set("MD5", metadata::hex_encode(&payload[0..16]));
    Ok(map)
}

pub fn parse_digest(payload: &[u8]) -> Result<OrderedMap> {
    if payload.len() != DIGEST_RECORD_LEN {
        return Err(Error::format_invalid(format!(
            "digest record is {} bytes, expected {DIGEST_RECORD_LEN}",
            payload.len()
        )));
    }
    checksum::verify_trailing(payload).map_err(|stored| {
        Error::format_invalid(format!("digest record checksum mismatch (stored {stored:#010x})"))
    })?;
    let mut map = OrderedMap::new();
    map.set("MD5", metadata::hex_encode(&payload[0..16]));
    map.set("SHA1", metadata::hex_encode(&payload[16..36]));
    Ok(map)
}

pub fn parse_xhash(payload: &[u8]) -> Result<OrderedMap> {
    let inflated = metadata::inflate(payload)?;
    let text = String::from_utf8_lossy(&inflated).into_owned();
    Ok(metadata::parse_xml_like(&text))
}

pub fn encode_hash(map: &OrderedMap) -> Result<Vec<u8>> {
    let md5 = metadata::hex_decode(map.get("MD5").unwrap_or_default(), 16)?;
    let mut buf = vec![0u8; HASH_RECORD_LEN];
    buf[0..16].copy_from_slice(&md5);
    let split = HASH_RECORD_LEN - 4;
    let sum = checksum::adler32(&buf[..split]);
    buf[split..].copy_from_slice(&sum.to_le_bytes());
    Ok(buf)
}

pub fn encode_digest(map: &OrderedMap) -> Result<Vec<u8>> {
    let md5 = metadata::hex_decode(map.get("MD5").unwrap_or_default(), 16)?;
    let sha1 = metadata::hex_decode(map.get("SHA1").unwrap_or_default(), 20)?;
    let mut buf = vec![0u8; DIGEST_RECORD_LEN];
    buf[0..16].copy_from_slice(&md5);
    buf[16..36].copy_from_slice(&sha1);
    let split = DIGEST_RECORD_LEN - 4;
    let sum = checksum::adler32(&buf[..split]);
    buf[split..].copy_from_slice(&sum.to_le_bytes());
    Ok(buf)
}

pub fn encode_xhash(map: &OrderedMap) -> Result<Vec<u8>> {
    let xml = metadata::render_xml_like(map, "xhash");
    metadata::deflate(xml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest;

    fn sample() -> OrderedMap {
        let mut map = OrderedMap::new();
        map.set("MD5", metadata::hex_encode(&digest::md5(b"hello")));
        map.set("SHA1", metadata::hex_encode(&digest::sha1(b"hello")));
        map
    }

    #[test]
    fn hash_round_trip() {
        let map = sample();
        let payload = encode_hash(&map).unwrap();
        assert_eq!(payload.len(), HASH_RECORD_LEN);
        let parsed = parse_hash(&payload).unwrap();
        assert_eq!(parsed.get("MD5"), map.get("MD5"));
    }

    #[test]
    fn digest_round_trip() {
        let map = sample();
        let payload = encode_digest(&map).unwrap();
        assert_eq!(payload.len(), DIGEST_RECORD_LEN);
        let parsed = parse_digest(&payload).unwrap();
        assert_eq!(parsed.get("MD5"), map.get("MD5"));
        assert_eq!(parsed.get("SHA1"), map.get("SHA1"));
    }

    #[test]
    fn xhash_round_trip() {
        let map = sample();
        let payload = encode_xhash(&map).unwrap();
        let parsed = parse_xhash(&payload).unwrap();
        assert_eq!(parsed.get("MD5"), map.get("MD5"));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let map = sample();
        let mut payload = encode_hash(&map).unwrap();
        payload[0] ^= 0xFF;
        let err = parse_hash(&payload).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }
}
