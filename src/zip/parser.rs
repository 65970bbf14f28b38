//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Walk the Central Directory once, feeding each file header to a
//!    [`CentralDirectoryVisitor`]
//! 4. For content retrieval, cross-check each file's Local File Header
//!
//! The visitor sees every header exactly once, in central-directory order,
//! bracketed by `visit_start` / `visit_end` calls. After the scan the caller
//! re-parses individual headers on demand with [`parse_header_at`], addressed
//! by their offset within the central directory; nothing is held in memory
//! beyond what the visitor chose to keep.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use log::debug;

use crate::error::{Result, ZipError};
use crate::io::{ByteRange, ReadAt};

use super::records::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// ZIP64 extended information extra field id.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Receives the results of a single forward scan over the central directory.
///
/// `visit_start` is called once with the declared entry count and the zip64
/// flag, then `visit_header` once per entry with its header and its offset
/// within the central directory, then `visit_end` once.
pub trait CentralDirectoryVisitor {
    fn visit_start(&mut self, total_entries: u64, zip64: bool);
    fn visit_header(&mut self, header: &RawFileHeader, offset: u64);
    fn visit_end(&mut self);
}

/// Location and extent of the central directory, resolved through the EOCD
/// (and the zip64 records when the EOCD carries sentinel values).
pub struct CentralDirectory {
    pub offset: u64,
    pub size: u64,
    pub total_entries: u64,
    pub zip64: bool,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code serves local files,
/// in-memory buffers and nested archive ranges.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method handles
    /// both the simple case (no comment) and archives with comments by
    /// searching backwards for the signature.
    ///
    /// Returns the record and its offset in the file, or a format error if no
    /// valid EOCD can be found.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Try the simple no-comment case first to avoid reading extra data.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_at(offset, &mut buf)?;

            // Check for signature and zero-length comment
            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        // EOCD not at the expected location; a trailing comment can push it
        // earlier, so search backwards from the end of the file.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_at(search_start, &mut buf)?;

        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // Candidate found; the comment length field must account for
                // every byte between the record and the end of the file.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd =
                        EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ZipError::format("Not a valid ZIP file"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD carries sentinel fields (0xFFFF or
    /// 0xFFFFFFFF). The locator sits immediately before the regular EOCD and
    /// points at the extended end record.
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64Eocd> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EocdLocator::SIZE as u64)
            .ok_or_else(|| ZipError::format("Missing ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EocdLocator::SIZE];
        self.reader.read_at(locator_offset, &mut locator_buf)?;

        let locator = Zip64EocdLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64Eocd::MIN_SIZE];
        self.reader.read_at(locator.eocd64_offset, &mut eocd64_buf)?;

        Zip64Eocd::from_bytes(&eocd64_buf)
    }

    /// Resolve the central directory's location, failing over to the zip64
    /// records when the EOCD says so.
    pub fn locate_central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            Ok(CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                total_entries: eocd64.total_entries,
                zip64: true,
            })
        } else {
            Ok(CentralDirectory {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                total_entries: eocd.total_entries as u64,
                zip64: false,
            })
        }
    }

    /// Scan the central directory once, feeding every file header to the
    /// visitor in discovery order.
    ///
    /// Returns the central-directory byte range; header offsets reported to
    /// the visitor are relative to it, so individual headers can later be
    /// re-parsed with [`parse_header_at`] without another EOCD round trip.
    pub fn scan<V: CentralDirectoryVisitor>(&self, visitor: &mut V) -> Result<ByteRange<R>> {
        let cd = self.locate_central_directory()?;
        debug!(
            "central directory: {} entries at {}+{} (zip64: {})",
            cd.total_entries, cd.offset, cd.size, cd.zip64
        );

        let range = ByteRange::new(Arc::clone(&self.reader), cd.offset, cd.size)?;
        visitor.visit_start(cd.total_entries, cd.zip64);

        let mut offset = 0u64;
        for _ in 0..cd.total_entries {
            let (header, consumed) = parse_header_at(&range, offset)?;
            visitor.visit_header(&header, offset);
            offset += consumed;
        }

        visitor.visit_end();
        Ok(range)
    }

    /// Compute the payload byte range for an entry by cross-checking its
    /// Local File Header.
    ///
    /// The LFH's name and extra-field lengths can legitimately differ from
    /// the central directory's copy for some producers, so the lengths are
    /// re-read from bytes 26..30 of the local header rather than trusted.
    pub fn payload_range(
        &self,
        local_header_offset: u64,
        compressed_size: u64,
    ) -> Result<ByteRange<R>> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_at(local_header_offset, &mut lfh_buf)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::format("Invalid Local File Header"));
        }

        let name_length = u16::from_le_bytes([lfh_buf[26], lfh_buf[27]]) as u64;
        let extra_length = u16::from_le_bytes([lfh_buf[28], lfh_buf[29]]) as u64;

        let data_offset = local_header_offset + LFH_SIZE as u64 + name_length + extra_length;
        ByteRange::new(Arc::clone(&self.reader), data_offset, compressed_size)
    }
}

/// Parse one Central Directory File Header at `offset` within the
/// central-directory range.
///
/// Returns the header and the total record length (fixed part plus name,
/// extra field and comment), which is also the distance to the next header.
pub(crate) fn parse_header_at<R: ReadAt>(
    cd: &ByteRange<R>,
    offset: u64,
) -> Result<(RawFileHeader, u64)> {
    let fixed = cd.read(offset, CDFH_MIN_SIZE as u64)?;
    if &fixed[0..4] != CDFH_SIGNATURE {
        return Err(ZipError::format("Invalid Central Directory File Header"));
    }

    let mut cursor = Cursor::new(&fixed[4..]);
    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let name_length = cursor.read_u16::<LittleEndian>()? as u64;
    let extra_length = cursor.read_u16::<LittleEndian>()? as u64;
    let comment_length = cursor.read_u16::<LittleEndian>()? as u64;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut local_header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let variable = cd.read(offset + CDFH_MIN_SIZE as u64, name_length + extra_length)?;
    let name = variable[..name_length as usize].to_vec();
    let extra = &variable[name_length as usize..];

    // ZIP64 extended information: fields are present only when the
    // corresponding fixed-width field carries the 0xFFFFFFFF sentinel, in
    // the order uncompressed size, compressed size, local header offset.
    let mut pos = 0usize;
    while pos + 4 <= extra.len() {
        let header_id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let field_size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let field_end = (pos + 4 + field_size).min(extra.len());
        if header_id == ZIP64_EXTRA_ID {
            let mut field = Cursor::new(&extra[pos + 4..field_end]);
            let field_len = (field_end - pos - 4) as u64;
            if uncompressed_size == 0xFFFFFFFF && field_len - field.position() >= 8 {
                uncompressed_size = field.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && field_len - field.position() >= 8 {
                compressed_size = field.read_u64::<LittleEndian>()?;
            }
            if local_header_offset == 0xFFFFFFFF && field_len - field.position() >= 8 {
                local_header_offset = field.read_u64::<LittleEndian>()?;
            }
        }
        pos = field_end;
    }

    let header = RawFileHeader::new(
        name,
        flags,
        CompressionMethod::from_u16(method),
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    );
    let consumed = CDFH_MIN_SIZE as u64 + name_length + extra_length + comment_length;
    Ok((header, consumed))
}
