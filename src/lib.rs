//! # nestzip
//!
//! A random-access ZIP/JAR entry index with nested archive, multi-release
//! and signature support.
//!
//! This library opens an archive over any [`ReadAt`] byte source, parses its
//! central directory once into a compact sorted index, and retrieves
//! individual entry contents on demand from byte offsets — without ever
//! loading the archive into memory. Because payload ranges are themselves
//! byte sources, archives stored inside other archives open the same way.
//!
//! ## Features
//!
//! - Hash-indexed name lookup over the central directory (one scan at open)
//! - On-demand entry content as streams, STORED or DEFLATE
//! - ZIP64 support for archives beyond the 4 GiB / 65535-entry limits
//! - Nested archives via zero-copy byte ranges
//! - Multi-release (`META-INF/versions/<v>/`) override resolution
//! - Lazy association of signature block files with verified entries
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use std::sync::Arc;
//! use nestzip::{FileReader, ZipIndex};
//!
//! fn main() -> Result<(), nestzip::ZipError> {
//!     let reader = Arc::new(FileReader::open("app.jar")?);
//!     let index = ZipIndex::open(reader)?;
//!
//!     // List all entries in archive order
//!     for entry in index.entries() {
//!         println!("{}", entry?.name());
//!     }
//!
//!     // Random-access retrieval of one entry
//!     if let Some(entry) = index.lookup("META-INF/MANIFEST.MF")? {
//!         let mut manifest = String::new();
//!         index.open_stream(&entry)?.read_to_string(&mut manifest)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod error;
pub mod index;
pub mod io;
pub mod release;
pub mod stream;
pub mod zip;

pub use cert::{Certification, SignatureFile};
pub use error::{Result, ZipError};
pub use index::{Entries, Entry, EntryFilter, EntryReader, Validator, ZipIndex};
pub use io::{ByteRange, FileReader, MemoryReader, RangeReader, ReadAt};
pub use zip::records::CompressionMethod;
