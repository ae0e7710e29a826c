//! Streaming UTF-16LE line reader (spec.md §4.7).
//!
//! Reads a logical byte stream (the decompressed body of a `header2` or
//! `xheader` section, which may itself span multiple physical sections) as
//! UTF-16LE text, yielding UTF-8 lines split on `\n\0` with a trailing
//! `\r\0` stripped. A running MD5 is kept over the raw bytes consumed; the
//! caller finalizes it against a stored hash at stream end. Unlike the
//! reference implementation, where this check is `TODO`-guarded and never
//! runs, a mismatch here is a hard `IntegrityMismatch`.

use crate::digest::Md5Engine;
use crate::error::{Error, Result};

const DEFAULT_BUFFER_LEN: usize = 16 * 1024 * 1024;
const MAX_LINE_LEN: usize = 1024 * 1024;

pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    digest: Md5Engine,
}

impl<R: std::io::Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_buffer_capacity(inner, DEFAULT_BUFFER_LEN)
    }

    pub fn with_buffer_capacity(inner: R, capacity: usize) -> Self {
        LineReader {
            inner,
            buffer: vec![0u8; capacity],
            start: 0,
            end: 0,
            eof: false,
            digest: Md5Engine::new(),
        }
    }

    fn refill(&mut self) -> Result<()> {
        if self.start > 0 {
            self.buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buffer.len() {
            return Err(Error::Resource(format!(
                "line exceeds the {}-byte refill buffer",
                self.buffer.len()
            )));
        }
        let n = self.inner.read(&mut self.buffer[self.end..])?;
        if n == 0 {
            self.eof = true;
        } else {
            self.end += n;
        }
        Ok(())
    }

    /// Reads the next line, decoded to UTF-8, or `None` at end of stream.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(rel_pos) = find_terminator(&self.buffer[self.start..self.end]) {
                let line_end = self.start + rel_pos;
                let consumed_end = line_end + 2;
                self.digest.update(&self.buffer[self.start..consumed_end]);

                let mut raw_line = &self.buffer[self.start..line_end];
                if raw_line.len() >= 2
                    && raw_line[raw_line.len() - 2] == b'\r'
                    && raw_line[raw_line.len() - 1] == 0
                {
                    raw_line = &raw_line[..raw_line.len() - 2];
                }
                let text = decode_utf16le_lossy(raw_line)?;
                self.start = consumed_end;
                return Ok(Some(text));
            }

            if self.eof {
                if self.start == self.end {
                    return Ok(None);
                }
                let raw_line = &self.buffer[self.start..self.end];
                self.digest.update(raw_line);
                let text = decode_utf16le_lossy(raw_line)?;
                self.start = self.end;
                return Ok(Some(text));
            }

            if self.end - self.start >= MAX_LINE_LEN {
                return Err(Error::Resource(format!(
                    "line exceeds the {MAX_LINE_LEN}-byte caller-visible limit"
                )));
            }
            self.refill()?;
        }
    }

    /// Consumes the reader, checking the running MD5 of every byte consumed
    /// so far against `expected`.
    pub fn finish(self, expected: [u8; 16]) -> Result<()> {
        let actual = self.digest.finalize();
        if actual != expected {
            return Err(Error::integrity(format!(
                "header stream MD5 mismatch: expected {}, computed {}",
                hex(&expected),
                hex(&actual)
            )));
        }
        Ok(())
    }
}

fn find_terminator(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == b'\n' && data[i + 1] == 0 {
            return Some(i);
        }
        i += 2;
    }
    None
}

fn decode_utf16le_lossy(raw: &[u8]) -> Result<String> {
    if raw.len() % 2 != 0 {
        return Err(Error::format_invalid("UTF-16LE line has an odd number of bytes"));
    }
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
