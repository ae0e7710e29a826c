//! Byte source abstraction.
//!
//! The handle never touches `std::fs` directly; it consumes named segment
//! files through these two traits. `OsFileSystem`/`OsSegment` is the default,
//! `std::fs`-backed implementation used outside of tests; anything that can
//! open, position-read, position-write, size and truncate a named blob can
//! stand in for it (an in-memory store for tests, a packed container, …).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// A single open segment file, addressed by byte offset rather than a
/// stateful cursor — the handle always knows the length it wants to read or
/// write and batches accordingly (spec.md §4.1).
pub trait SegmentFile: Send {
    /// Reads up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes actually read; a short read at end-of-file is not an
    /// error.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `buf` starting at `offset`.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Current length of the segment in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Truncates (or extends with implementation-defined content) the
    /// segment to `new_len` bytes. Write-mode only.
    fn set_len(&mut self, new_len: u64) -> Result<()>;

    /// Reads exactly `buf.len()` bytes, failing with `Error::Io` on a short
    /// read.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n != buf.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read: wanted {} bytes, got {}", buf.len(), n),
            )));
        }
        Ok(())
    }
}

/// The capability to open named segment files by the filenames the naming
/// scheme (spec.md §4.3) produces. Implementations do not need directory
/// listing — discovery walks the deterministic naming sequence and uses
/// `exists`/`open_read` to find the end of the chain.
pub trait SegmentFileSystem {
    type File: SegmentFile;

    /// Opens an existing segment for reading.
    fn open_read(&self, name: &str) -> Result<Self::File>;

    /// Opens (creating if necessary, truncating if it already exists) a
    /// segment for writing.
    fn create(&self, name: &str) -> Result<Self::File>;

    /// Reports whether a segment with this name can currently be opened for
    /// reading.
    fn exists(&self, name: &str) -> bool;
}

/// `std::fs`-backed [`SegmentFile`].
pub struct OsSegment {
    file: File,
}

impl SegmentFile for OsSegment {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        self.file.set_len(new_len)?;
        Ok(())
    }
}

/// `std::fs`-backed [`SegmentFileSystem`]: segments are files in a single
/// directory, addressed by filename only.
pub struct OsFileSystem {
    directory: PathBuf,
}

impl OsFileSystem {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl SegmentFileSystem for OsFileSystem {
    type File = OsSegment;

    fn open_read(&self, name: &str) -> Result<Self::File> {
        let file = File::open(self.path_for(name))?;
        Ok(OsSegment { file })
    }

    fn create(&self, name: &str) -> Result<Self::File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(self.path_for(name))?;
        Ok(OsSegment { file })
    }

    fn exists(&self, name: &str) -> bool {
        Path::new(&self.path_for(name)).is_file()
    }
}

/// In-memory [`SegmentFile`]/[`SegmentFileSystem`] pair, used by the test
/// suite to build and round-trip synthetic images without touching disk.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    segments: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemorySegment {
    name: String,
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl SegmentFile for MemorySegment {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let store = self.store.lock().unwrap();
        let data = store.get(&self.name).map(Vec::as_slice).unwrap_or(&[]);
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut store = self.store.lock().unwrap();
        let data = store.entry(self.name.clone()).or_default();
        let offset = offset as usize;
        if data.len() < offset + buf.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn len(&mut self) -> Result<u64> {
        let store = self.store.lock().unwrap();
        Ok(store.get(&self.name).map(Vec::len).unwrap_or(0) as u64)
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let data = store.entry(self.name.clone()).or_default();
        data.resize(new_len as usize, 0);
        Ok(())
    }
}

impl SegmentFileSystem for MemoryFileSystem {
    type File = MemorySegment;

    fn open_read(&self, name: &str) -> Result<Self::File> {
        if !self.exists(name) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such segment: {name}"),
            )));
        }
        Ok(MemorySegment {
            name: name.to_string(),
            store: self.segments.clone(),
        })
    }

    fn create(&self, name: &str) -> Result<Self::File> {
        self.segments
            .lock()
            .unwrap()
            .insert(name.to_string(), Vec::new());
        Ok(MemorySegment {
            name: name.to_string(),
            store: self.segments.clone(),
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.segments.lock().unwrap().contains_key(name)
    }
}
