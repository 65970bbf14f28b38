//! Random-access byte sources.
//!
//! The engine never loads an archive into memory: every structure is decoded
//! from positional reads against a [`ReadAt`] source, and entry payloads are
//! exposed as [`ByteRange`] subsections that read lazily.
//!
//! [`ByteRange`] itself implements [`ReadAt`], which is what makes nested
//! archives work: the payload range of a stored inner archive can be handed
//! straight back to [`ZipIndex::open`](crate::ZipIndex::open).

mod file;
mod memory;

pub use file::FileReader;
pub use memory::MemoryReader;

use std::io::{self, Read};
use std::sync::Arc;

use crate::error::{Result, ZipError};

/// Trait for random access reading from a data source.
pub trait ReadAt: Send + Sync {
    /// Read exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Short reads are errors; the engine always knows how many bytes a
    /// record occupies before asking for them.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size of the data source in bytes.
    fn size(&self) -> u64;
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<R: ReadAt + ?Sized> ReadAt for Arc<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// A bounds-checked window over a [`ReadAt`] source.
///
/// Ranges are cheap handles (shared reader + offset + length) and never copy
/// data eagerly. Reads are addressed relative to the range start.
pub struct ByteRange<R: ReadAt> {
    reader: Arc<R>,
    offset: u64,
    len: u64,
}

impl<R: ReadAt> Clone for ByteRange<R> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<R: ReadAt> ByteRange<R> {
    /// Create a range covering `len` bytes of `reader` starting at `offset`.
    pub fn new(reader: Arc<R>, offset: u64, len: u64) -> Result<Self> {
        let size = reader.size();
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(ZipError::format(format!(
                "Byte range {offset}+{len} exceeds source size {size}"
            )));
        }
        Ok(Self { reader, offset, len })
    }

    /// A range covering the whole source.
    pub fn whole(reader: Arc<R>) -> Self {
        let len = reader.size();
        Self { reader, offset: 0, len }
    }

    /// Length of the range in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A sub-range relative to this range.
    pub fn subsection(&self, offset: u64, len: u64) -> Result<Self> {
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(ZipError::format(format!(
                "Subsection {offset}+{len} exceeds range length {}",
                self.len
            )));
        }
        Ok(Self {
            reader: Arc::clone(&self.reader),
            offset: self.offset + offset,
            len,
        })
    }

    /// Fill `buf` from the range, starting at the relative `offset`.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let wanted = buf.len() as u64;
        if offset.checked_add(wanted).is_none_or(|end| end > self.len) {
            return Err(ZipError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Read {offset}+{wanted} past end of range ({})", self.len),
            )));
        }
        self.reader.read_at(self.offset + offset, buf)
    }

    /// Read `len` bytes at the relative `offset` into a fresh buffer.
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read the entire range into a buffer.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.read(0, self.len)
    }

    /// A [`Read`] adapter that streams the range from the start.
    pub fn stream(&self) -> RangeReader<R> {
        RangeReader {
            range: self.clone(),
            position: 0,
        }
    }
}

impl<R: ReadAt> ReadAt for ByteRange<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_into(offset, buf)
    }

    fn size(&self) -> u64 {
        self.len
    }
}

/// Streams a [`ByteRange`] through the blocking [`Read`] interface.
pub struct RangeReader<R: ReadAt> {
    range: ByteRange<R>,
    position: u64,
}

impl<R: ReadAt> Read for RangeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.range.len() - self.position;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(remaining) as usize;
        self.range
            .read_into(self.position, &mut buf[..n])
            .map_err(io::Error::from)?;
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsection_is_relative_and_bounded() {
        let reader = Arc::new(MemoryReader::new(b"0123456789".to_vec()));
        let range = ByteRange::new(Arc::clone(&reader), 2, 6).unwrap();
        assert_eq!(range.read_all().unwrap(), b"234567");

        let sub = range.subsection(1, 3).unwrap();
        assert_eq!(sub.read_all().unwrap(), b"345");
        assert!(sub.subsection(1, 3).is_err());
        assert!(range.read(4, 3).is_err());
    }

    #[test]
    fn range_reader_streams_to_end() {
        let reader = Arc::new(MemoryReader::new(b"abcdef".to_vec()));
        let range = ByteRange::new(reader, 1, 4).unwrap();
        let mut out = Vec::new();
        range.stream().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"bcde");
    }
}
