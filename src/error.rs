//! Error taxonomy for the archive engine.
//!
//! Two failure classes exist: [`ZipError::Format`] for malformed or truncated
//! archive structures (fatal for the whole archive, surfaced to the opener)
//! and [`ZipError::Io`] for byte-source failures (surfaced to the caller of
//! the operation that triggered them, without poisoning the index).
//!
//! A name that is simply not present in the archive is never an error; lookup
//! operations return `Ok(None)` instead.

use std::io;

use thiserror::Error;

/// Errors produced while opening or reading a ZIP/JAR archive.
#[derive(Debug, Error)]
pub enum ZipError {
    /// The archive bytes do not form a valid ZIP structure.
    #[error("{0}")]
    Format(String),

    /// The underlying byte source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ZipError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        ZipError::Format(message.into())
    }
}

impl From<ZipError> for io::Error {
    fn from(err: ZipError) -> io::Error {
        match err {
            ZipError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = ZipError> = std::result::Result<T, E>;
