//! Read and write Expert Witness Compression Format (EWF/E01) forensic disk
//! images.
//!
//! The entry point is [`ImageHandle`]: open an existing image with
//! [`ImageHandle::open_read`], or start a new one with [`ImageHandle::create`].
//! Both are generic over [`byte_source::SegmentFileSystem`], so the same
//! handle logic runs against `std::fs` ([`byte_source::OsFileSystem`]) or an
//! in-memory store used by this crate's own test suite
//! ([`byte_source::MemoryFileSystem`]).
//!
//! ```no_run
//! use exhume_ewf::byte_source::OsFileSystem;
//! use exhume_ewf::ImageHandle;
//!
//! # fn main() -> exhume_ewf::Result<()> {
//! let fs = OsFileSystem::new("/evidence");
//! let mut image = ImageHandle::open_read(fs, "case001.E01")?;
//! let mut buf = vec![0u8; image.get_chunk_size()? as usize];
//! image.read_buffer(&mut buf)?;
//! # Ok(())
//! # }
//! ```

pub mod byte_source;
pub mod cache;
pub mod checksum;
pub mod chunk_table;
pub mod codec;
pub mod digest;
pub mod empty_block;
pub mod endian;
pub mod error;
pub mod handle;
pub mod line_reader;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod section;
pub mod segment;

pub use error::{Error, Result};
pub use handle::{CreateOptions, ImageHandle, Mode, Whence, WriteOptions};
pub use media::{FormatVariant, MediaType, MediaValues};
