//! Error type for the GPT engine.

use std::fmt;
use std::io;

/// Errors returned when reading, validating, repairing or writing GPT
/// metadata.
#[non_exhaustive]
#[derive(Debug)]
pub enum GptError {
    /// Generic IO error surfaced by the underlying `DiskAccess` collaborator.
    Io(io::Error),
    /// The on-disk bytes do not form a structurally valid GPT: bad magic,
    /// version, CRC, sizes, or layout ordering.
    BadPartitionTable(String),
    /// A sector that must exist (most commonly the backup header's location)
    /// could not be placed within the known bounds of the disk.
    OutOfRange(String),
    /// A buffer this operation needed could not be sized or allocated.
    OutOfMemory(String),
    /// An operation was asked to proceed from a state it should never be in,
    /// e.g. `write` without both copies valid, or a header `recompute`
    /// produces re-validates to failure.
    Bug(String),
    /// The engine does not support this on-disk variation (a sector-size
    /// mismatch between state and disk, or a non-native `header_size` on the
    /// write path).
    NotImplemented(String),
    /// The caller passed a device that is not a GPT partition.
    BadArgument(String),
}

impl From<io::Error> for GptError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::error::Error for GptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for GptError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use GptError::*;
        match self {
            Io(e) => write!(fmt, "GPT IO error: {e}"),
            BadPartitionTable(m) => write!(fmt, "bad partition table: {m}"),
            OutOfRange(m) => write!(fmt, "out of range: {m}"),
            OutOfMemory(m) => write!(fmt, "out of memory: {m}"),
            Bug(m) => write!(fmt, "internal bug: {m}"),
            NotImplemented(m) => write!(fmt, "not implemented: {m}"),
            BadArgument(m) => write!(fmt, "bad argument: {m}"),
        }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, GptError>;
