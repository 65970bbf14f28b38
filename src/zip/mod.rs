//! ZIP format parsing.
//!
//! This module decodes the on-disk ZIP structures, supporting both the
//! standard format and ZIP64 extensions for large archives.
//!
//! ## Components
//!
//! - [`records`]: Data structures representing ZIP format elements (EOCD,
//!   file headers, zip64 records)
//! - [`parser`]: Low-level parsing of those structures from a random-access
//!   byte source, driving a visitor over the central directory
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! This implementation reads the EOCD first (from the end of the file), then
//! walks the Central Directory, which allows indexing every entry without
//! touching any entry data.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - Only STORED and DEFLATE payloads can be opened as streams

pub mod parser;
pub mod records;

pub use parser::{CentralDirectory, CentralDirectoryVisitor, ZipParser};
pub use records::*;
