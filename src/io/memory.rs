use std::io;

use super::ReadAt;
use crate::error::{Result, ZipError};

/// In-memory reader, mainly useful for tests and for small archives that are
/// already resident (for example an inner archive extracted by a caller).
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ReadAt for MemoryReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                ZipError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("Read {offset}+{} past end of buffer", buf.len()),
                ))
            })?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
