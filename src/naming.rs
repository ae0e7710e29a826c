//! Segment filename encoding and sibling discovery (spec.md §4.3).
//!
//! A base name `NAME` yields, for the k-th segment (`k >= 1`), the filename
//! `NAME.XYZ` where `XYZ` is three characters: a flavour letter followed by
//! two base-26 digits for `k <= 99`, or three letters (the leading one
//! rolling over once every 676 segments) for `k > 99`.

use crate::byte_source::SegmentFileSystem;
use crate::error::{Error, Result};

/// Which of the EWF flavours' filename alphabet to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingSchema {
    /// Standard EWF, upper-case (`E01`, `E02`, … `EAA`, … `ZZZ`).
    E01,
    /// Logical EWF (`L01`, …).
    L01,
    /// SMART / EWF `s01`.
    S01,
    /// Standard EWF, lower-case extension (`e01`, …).
    E01Lower,
}

impl NamingSchema {
    fn first_char(self) -> u8 {
        match self {
            NamingSchema::E01 => b'E',
            NamingSchema::L01 => b'L',
            NamingSchema::S01 => b's',
            NamingSchema::E01Lower => b'e',
        }
    }

    fn last_char(self) -> u8 {
        match self {
            NamingSchema::S01 | NamingSchema::E01Lower => b'z',
            NamingSchema::E01 | NamingSchema::L01 => b'Z',
        }
    }

    /// Highest segment number representable under this schema (the point at
    /// which the leading letter would have to pass `last_char`).
    pub fn max_segment_number(self) -> u32 {
        let span = (self.last_char() - self.first_char()) as u32 + 1;
        99 + span * 26 * 26
    }

    /// Parses the schema from a known-unrolled-over (i.e. first-segment)
    /// extension's leading letter.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let first = ext.as_bytes().first().copied()?;
        match first {
            b'E' => Some(NamingSchema::E01),
            b'L' => Some(NamingSchema::L01),
            b's' => Some(NamingSchema::S01),
            b'e' => Some(NamingSchema::E01Lower),
            _ => None,
        }
    }
}

/// Encodes a 1-based segment number into its 3-character extension under
/// `schema`.
pub fn encode_extension(segment_number: u32, schema: NamingSchema) -> Result<String> {
    if segment_number == 0 || segment_number > schema.max_segment_number() {
        return Err(Error::argument(format!(
            "segment number {segment_number} out of range 1..={}",
            schema.max_segment_number()
        )));
    }

    let first = schema.first_char();
    if segment_number < 100 {
        return Ok(format!("{}{:02}", first as char, segment_number));
    }

    // k=100 -> AA, k=2601 -> the leading letter rolls over once (FAA, …).
    let mut n = segment_number - 100;
    let low = (n % 26) as u8;
    n /= 26;
    let mid = (n % 26) as u8;
    n /= 26;
    let high_offset = n as u8;

    let base = if first.is_ascii_uppercase() { b'A' } else { b'a' };
    let leading = first + high_offset;

    Ok(format!(
        "{}{}{}",
        leading as char,
        (base + mid) as char,
        (base + low) as char
    ))
}

/// Decodes a 3-character extension back into its 1-based segment number
/// under `schema`. Inverse of [`encode_extension`].
pub fn decode_extension(extension: &str, schema: NamingSchema) -> Result<u32> {
    let bytes = extension.as_bytes();
    if bytes.len() != 3 {
        return Err(Error::format_invalid(format!(
            "segment extension must be 3 characters, got {extension:?}"
        )));
    }
    let first = bytes[0];
    let rest = &bytes[1..];

    if rest[0].is_ascii_digit() && rest[1].is_ascii_digit() {
        if first != schema.first_char() {
            return Err(Error::format_invalid(format!(
                "segment extension {extension:?} does not match the expected naming schema"
            )));
        }
        let n = (rest[0] - b'0') as u32 * 10 + (rest[1] - b'0') as u32;
        if n == 0 {
            return Err(Error::format_invalid("segment number 0 is not valid"));
        }
        return Ok(n);
    }

    let base = if first.is_ascii_uppercase() {
        b'A'
    } else if first.is_ascii_lowercase() {
        b'a'
    } else {
        return Err(Error::format_invalid(format!(
            "malformed segment extension {extension:?}"
        )));
    };
    if !rest[0].is_ascii_alphabetic() || !rest[1].is_ascii_alphabetic() {
        return Err(Error::format_invalid(format!(
            "malformed segment extension {extension:?}"
        )));
    }
    let high = first
        .checked_sub(schema.first_char())
        .ok_or_else(|| Error::format_invalid(format!("malformed segment extension {extension:?}")))?
        as u32;
    if first > schema.last_char() {
        return Err(Error::format_invalid(format!(
            "segment extension {extension:?} exceeds the naming schema's range"
        )));
    }

    let mid = (rest[0] - base) as u32;
    let low = (rest[1] - base) as u32;
    Ok(100 + high * 26 * 26 + mid * 26 + low)
}

/// Given the filename of one known segment, returns the full ordered list of
/// sibling segment filenames by walking the naming scheme until a name does
/// not exist. Fails if the first segment (`k=1`) is missing.
///
/// The naming schema is inferred from `known_filename`'s extension, which
/// must therefore be one whose leading letter has not rolled over (any
/// segment number up to the 2600th works; see [`NamingSchema::from_extension`]).
pub fn discover_siblings<FS: SegmentFileSystem>(
    fs: &FS,
    known_filename: &str,
) -> Result<Vec<String>> {
    let (base, ext) = known_filename.rsplit_once('.').ok_or_else(|| {
        Error::argument(format!("segment filename has no extension: {known_filename}"))
    })?;
    let schema = NamingSchema::from_extension(ext)
        .ok_or_else(|| Error::unsupported(format!("unrecognized segment extension: {ext}")))?;

    let mut names = Vec::new();
    let mut k = 1u32;
    loop {
        let candidate_ext = encode_extension(k, schema)?;
        let candidate = format!("{base}.{candidate_ext}");
        if !fs.exists(&candidate) {
            break;
        }
        names.push(candidate);
        k += 1;
    }

    if names.is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("segment 1 of {base} is missing"),
        )));
    }
    Ok(names)
}
