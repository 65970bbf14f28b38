//! Sequential, front-to-back archive reading.
//!
//! This is the conventional streaming path, distinct from the random-access
//! central-directory path: it walks local file headers from the start of the
//! byte stream. The certification extractor uses it to correlate streamed
//! entries with indexed ones; the two paths can legitimately disagree, which
//! is exactly what the correlation is meant to detect.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use flate2::read::DeflateDecoder;

use crate::error::Result;
use crate::io::{ByteRange, ReadAt};
use crate::zip::records::{
    CompressionMethod, DATA_DESCRIPTOR_SIGNATURE, FLAG_DATA_DESCRIPTOR, LFH_SIGNATURE, LFH_SIZE,
};

/// An entry as seen by the sequential reader, metadata taken from its Local
/// File Header only.
pub struct StreamedEntry {
    pub name: Vec<u8>,
    pub flags: u16,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Absolute offset of the payload within the streamed range.
    pub data_offset: u64,
}

impl StreamedEntry {
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    /// Flag bit 3: sizes and CRC live in a trailing data descriptor, and the
    /// local header copies read as zero.
    pub fn has_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn name_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Walks local file headers in stream order.
///
/// The caller drives the walk: after each [`next_entry`](Self::next_entry)
/// it must [`advance`](Self::advance) past the payload, supplying the
/// compressed size when the local header does not carry one (descriptor
/// entries). Sizes for those typically come from the entry index.
pub struct SequentialReader<R: ReadAt> {
    data: ByteRange<R>,
    offset: u64,
}

impl<R: ReadAt> SequentialReader<R> {
    pub fn new(data: ByteRange<R>) -> Self {
        Self { data, offset: 0 }
    }

    /// Parse the local file header at the current position.
    ///
    /// Returns `None` once the stream stops yielding local headers, i.e. at
    /// the start of the central directory.
    pub fn next_entry(&mut self) -> Result<Option<StreamedEntry>> {
        if self.offset + (LFH_SIZE as u64) > self.data.len() {
            return Ok(None);
        }
        let header = self.data.read(self.offset, LFH_SIZE as u64)?;
        if &header[0..4] != LFH_SIGNATURE {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&header[4..]);
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_length = cursor.read_u16::<LittleEndian>()? as u64;

        let name = self.data.read(self.offset + LFH_SIZE as u64, name_length)?;
        let data_offset = self.offset + LFH_SIZE as u64 + name_length + extra_length;
        self.offset = data_offset;

        Ok(Some(StreamedEntry {
            name,
            flags,
            method: CompressionMethod::from_u16(method),
            crc32,
            compressed_size,
            uncompressed_size,
            data_offset,
        }))
    }

    /// Skip the payload of the entry returned by the last `next_entry`, plus
    /// its data descriptor when present.
    pub fn advance(&mut self, entry: &StreamedEntry, compressed_size: u64) -> Result<()> {
        self.offset += compressed_size;
        if entry.has_descriptor() {
            // crc + compressed + uncompressed, 4-byte fields or 8-byte for
            // zip64-sized payloads, optionally preceded by a signature.
            let wide = compressed_size > 0xFFFFFFFF || entry.uncompressed_size > 0xFFFFFFFF;
            let mut skip = if wide { 20 } else { 12 };
            if self.offset + 4 <= self.data.len() {
                let sig = self.data.read(self.offset, 4)?;
                if sig == DATA_DESCRIPTOR_SIGNATURE {
                    skip += 4;
                }
            }
            self.offset += skip;
        }
        Ok(())
    }

    /// The payload range for a streamed entry, once its compressed size is
    /// known.
    pub fn payload(&self, entry: &StreamedEntry, compressed_size: u64) -> Result<ByteRange<R>> {
        self.data.subsection(entry.data_offset, compressed_size)
    }
}

/// Decompress `payload` according to `method` and check that it yields
/// exactly `expected_size` bytes with the expected CRC-32.
///
/// Unknown methods never verify. The inflate transform is bounded so a
/// corrupt stream cannot expand past the declared size.
pub fn verify_payload<R: ReadAt>(
    payload: &ByteRange<R>,
    method: CompressionMethod,
    expected_size: u64,
    expected_crc: u32,
) -> Result<bool> {
    let mut reader: Box<dyn Read + '_> = match method {
        CompressionMethod::Stored => Box::new(payload.stream()),
        CompressionMethod::Deflate => {
            // expected_size is an untrusted header field and may be u64::MAX.
            Box::new(DeflateDecoder::new(payload.stream()).take(expected_size.saturating_add(1)))
        }
        CompressionMethod::Unknown(_) => return Ok(false),
    };

    let mut hasher = crc32fast::Hasher::new();
    let mut total = 0u64;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
        if total > expected_size {
            return Ok(false);
        }
    }
    Ok(total == expected_size && hasher.finalize() == expected_crc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn verify_tolerates_extreme_declared_size() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"tiny").unwrap();
        let packed = encoder.finish().unwrap();
        let payload = ByteRange::whole(Arc::new(MemoryReader::new(packed)));

        let verified =
            verify_payload(&payload, CompressionMethod::Deflate, u64::MAX, 0).unwrap();
        assert!(!verified);
    }

    #[test]
    fn verify_checks_length_and_crc() {
        let payload = ByteRange::whole(Arc::new(MemoryReader::new(b"abcd".to_vec())));
        let crc = crc32fast::hash(b"abcd");
        assert!(verify_payload(&payload, CompressionMethod::Stored, 4, crc).unwrap());
        assert!(!verify_payload(&payload, CompressionMethod::Stored, 4, crc ^ 1).unwrap());
        assert!(!verify_payload(&payload, CompressionMethod::Stored, 3, crc).unwrap());
    }
}
