//! Error taxonomy for the image handle and its subsystems.
//!
//! The seven kinds below are the ones a caller must be able to distinguish
//! (see the specification's error handling design): `Argument`, `State`,
//! `Io`, `FormatInvalid`, `IntegrityMismatch`, `Unsupported`, `Resource`.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by every fallible operation in this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An out-of-range offset, a null/empty buffer where one is required, or
    /// any other caller-supplied argument that cannot be satisfied.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The operation is not allowed in the handle's current state (e.g.
    /// `set_header_value` after the first write, `write_buffer` on a
    /// read-mode handle).
    #[error("invalid operation for current state: {0}")]
    State(String),

    /// A byte-source read/write/open failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Signature mismatch, section checksum mismatch, table entry out of
    /// bounds, unexpected section ordering, or any other on-disk structure
    /// that does not conform to the wire format.
    #[error("malformed EWF structure: {0}")]
    FormatInvalid(String),

    /// A chunk checksum failed on both the `table` and `table2` paths, or a
    /// stored digest (MD5/SHA-1) did not match the recomputed value at
    /// close.
    #[error("integrity check failed: {0}")]
    IntegrityMismatch(String),

    /// A format variant or compression method this crate does not
    /// implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An allocation failure, or a size that would require one implausible
    /// for the class of media this crate targets.
    #[error("resource exhausted: {0}")]
    Resource(String),
}

impl Error {
    pub(crate) fn format_invalid(msg: impl Into<String>) -> Self {
        Error::FormatInvalid(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        Error::IntegrityMismatch(msg.into())
    }
}

/// A thin display wrapper used when formatting a chain of section-parse
/// failures into a single message (the target-language analogue of the
/// reference implementation's error "backtrace").
pub(crate) struct Cause(pub Vec<String>);

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(": caused by: "))
    }
}
