use byteorder::{LittleEndian, ReadBytesExt};
use std::borrow::Cow;
use std::io::Cursor;

use crate::error::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::format("Invalid End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// True when any field carries the "see zip64 record" sentinel.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EocdLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::format("Invalid ZIP64 locator"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64Eocd {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::format("Invalid ZIP64 End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor signature (optional in the wild)
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// General purpose flag bit 3: sizes live in a trailing data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// An entry's metadata as recorded in the central directory.
///
/// The name is kept as raw bytes; the index hashes and compares names without
/// ever building an owned string for them.
#[derive(Debug, Clone)]
pub struct RawFileHeader {
    name: Vec<u8>,
    pub flags: u16,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl RawFileHeader {
    pub(crate) fn new(
        name: Vec<u8>,
        flags: u16,
        method: CompressionMethod,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        local_header_offset: u64,
    ) -> Self {
        Self {
            name,
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        }
    }

    /// Raw name bytes exactly as stored in the central directory.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Name decoded leniently; non-UTF8 names are not rejected.
    pub fn name_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Directory entries end with '/'.
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    /// Compare against `name`, optionally with a single-byte suffix appended.
    ///
    /// The suffix form supports directory-style lookups: `has_name(b"dir",
    /// Some(b'/'))` matches the stored name `dir/` without the caller having
    /// to know the entry is a directory.
    pub fn has_name(&self, name: &[u8], suffix: Option<u8>) -> bool {
        match suffix {
            None => self.name == name,
            Some(suffix) => {
                self.name.len() == name.len() + 1
                    && self.name[..name.len()] == *name
                    && self.name[name.len()] == suffix
            }
        }
    }

    pub(crate) fn rename(&mut self, name: Vec<u8>) {
        self.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eocd_rejects_bad_signature() {
        let mut data = vec![0u8; EndOfCentralDirectory::SIZE];
        data[..4].copy_from_slice(b"PK\x05\x07");
        assert!(EndOfCentralDirectory::from_bytes(&data).is_err());
    }

    #[test]
    fn eocd_sentinels_flag_zip64() {
        let mut data = vec![0u8; EndOfCentralDirectory::SIZE];
        data[..4].copy_from_slice(EndOfCentralDirectory::SIGNATURE);
        data[8..10].copy_from_slice(&0xFFFFu16.to_le_bytes());
        data[10..12].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let eocd = EndOfCentralDirectory::from_bytes(&data).unwrap();
        assert!(eocd.is_zip64());
    }

    #[test]
    fn header_name_matching_with_suffix() {
        let header = RawFileHeader::new(
            b"dir/".to_vec(),
            0,
            CompressionMethod::Stored,
            0,
            0,
            0,
            0,
        );
        assert!(header.is_directory());
        assert!(header.has_name(b"dir/", None));
        assert!(header.has_name(b"dir", Some(b'/')));
        assert!(!header.has_name(b"dir", None));
        assert!(!header.has_name(b"di", Some(b'/')));
    }
}
