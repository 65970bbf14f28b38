//! Deterministic archive builder for tests.
//!
//! Output is intentionally simple: fixed timestamps, explicit sizes, no data
//! descriptors. Local extra fields can be set independently of the central
//! directory copy, and zip64 mode writes sentinel EOCD fields backed by real
//! zip64 records, which is enough to exercise every parser path the engine
//! has.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::Compression;
use flate2::write::DeflateEncoder;

use nestzip::{ReadAt, Result};

/// One entry to place in a built archive.
#[derive(Clone)]
pub struct EntrySpec {
    pub name: String,
    pub payload: Vec<u8>,
    pub deflate: bool,
    /// Extra field written to the local header only; the central directory
    /// copy stays empty, mimicking producers whose two lengths disagree.
    pub local_extra: Vec<u8>,
    /// Store the local header offset behind a zip64 extra-field override.
    pub zip64_offset: bool,
}

impl EntrySpec {
    pub fn stored(name: &str, payload: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            payload: payload.to_vec(),
            deflate: false,
            local_extra: Vec::new(),
            zip64_offset: false,
        }
    }

    pub fn deflated(name: &str, payload: &[u8]) -> Self {
        Self {
            deflate: true,
            ..Self::stored(name, payload)
        }
    }

    pub fn directory(name: &str) -> Self {
        assert!(name.ends_with('/'));
        Self::stored(name, b"")
    }

    pub fn with_local_extra(mut self, extra: &[u8]) -> Self {
        self.local_extra = extra.to_vec();
        self
    }

    pub fn with_zip64_offset(mut self) -> Self {
        self.zip64_offset = true;
        self
    }
}

/// A manifest entry marking the archive multi-release.
pub fn multi_release_manifest() -> EntrySpec {
    EntrySpec::stored(
        "META-INF/MANIFEST.MF",
        b"Manifest-Version: 1.0\r\nMulti-Release: true\r\n\r\n",
    )
}

pub fn build_zip(entries: &[EntrySpec]) -> Vec<u8> {
    build(entries, false, b"")
}

pub fn build_zip64(entries: &[EntrySpec]) -> Vec<u8> {
    build(entries, true, b"")
}

pub fn build_zip_with_comment(entries: &[EntrySpec], comment: &[u8]) -> Vec<u8> {
    build(entries, false, comment)
}

fn build(entries: &[EntrySpec], zip64: bool, comment: &[u8]) -> Vec<u8> {
    fn u16le(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn u32le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }
    fn u64le(v: u64) -> [u8; 8] {
        v.to_le_bytes()
    }

    let mut out = Vec::new();
    let mut cd = Vec::new();

    for entry in entries {
        let name = entry.name.as_bytes();
        let method: u16 = if entry.deflate { 8 } else { 0 };
        let crc = crc32fast::hash(&entry.payload);
        let data = if entry.deflate {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&entry.payload).unwrap();
            encoder.finish().unwrap()
        } else {
            entry.payload.clone()
        };

        let local_off = out.len() as u64;

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&u16le(20));
        out.extend_from_slice(&u16le(0)); // flags
        out.extend_from_slice(&u16le(method));
        out.extend_from_slice(&u16le(0)); // mod time
        out.extend_from_slice(&u16le(0)); // mod date
        out.extend_from_slice(&u32le(crc));
        out.extend_from_slice(&u32le(data.len() as u32));
        out.extend_from_slice(&u32le(entry.payload.len() as u32));
        out.extend_from_slice(&u16le(name.len() as u16));
        out.extend_from_slice(&u16le(entry.local_extra.len() as u16));
        out.extend_from_slice(name);
        out.extend_from_slice(&entry.local_extra);
        out.extend_from_slice(&data);

        // Central directory copy deliberately omits the local extra field.
        let (offset_field, cd_extra) = if entry.zip64_offset {
            let mut extra = Vec::new();
            extra.extend_from_slice(&u16le(0x0001));
            extra.extend_from_slice(&u16le(8));
            extra.extend_from_slice(&u64le(local_off));
            (0xFFFFFFFFu32, extra)
        } else {
            (local_off as u32, Vec::new())
        };

        cd.extend_from_slice(b"PK\x01\x02");
        cd.extend_from_slice(&u16le(20)); // version made by
        cd.extend_from_slice(&u16le(20)); // version needed
        cd.extend_from_slice(&u16le(0)); // flags
        cd.extend_from_slice(&u16le(method));
        cd.extend_from_slice(&u16le(0)); // mod time
        cd.extend_from_slice(&u16le(0)); // mod date
        cd.extend_from_slice(&u32le(crc));
        cd.extend_from_slice(&u32le(data.len() as u32));
        cd.extend_from_slice(&u32le(entry.payload.len() as u32));
        cd.extend_from_slice(&u16le(name.len() as u16));
        cd.extend_from_slice(&u16le(cd_extra.len() as u16));
        cd.extend_from_slice(&u16le(0)); // comment length
        cd.extend_from_slice(&u16le(0)); // disk number start
        cd.extend_from_slice(&u16le(0)); // internal attrs
        cd.extend_from_slice(&u32le(0)); // external attrs
        cd.extend_from_slice(&u32le(offset_field));
        cd.extend_from_slice(name);
        cd.extend_from_slice(&cd_extra);
    }

    let cd_start = out.len() as u64;
    out.extend_from_slice(&cd);
    let cd_size = cd.len() as u64;

    if zip64 {
        let eocd64_offset = out.len() as u64;

        out.extend_from_slice(b"PK\x06\x06");
        out.extend_from_slice(&u64le(44)); // size of remaining record
        out.extend_from_slice(&u16le(45)); // version made by
        out.extend_from_slice(&u16le(45)); // version needed
        out.extend_from_slice(&u32le(0)); // disk number
        out.extend_from_slice(&u32le(0)); // disk with cd
        out.extend_from_slice(&u64le(entries.len() as u64));
        out.extend_from_slice(&u64le(entries.len() as u64));
        out.extend_from_slice(&u64le(cd_size));
        out.extend_from_slice(&u64le(cd_start));

        out.extend_from_slice(b"PK\x06\x07");
        out.extend_from_slice(&u32le(0)); // disk with zip64 eocd
        out.extend_from_slice(&u64le(eocd64_offset));
        out.extend_from_slice(&u32le(1)); // total disks
    }

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&u16le(0)); // disk number
    out.extend_from_slice(&u16le(0)); // disk with cd
    if zip64 {
        out.extend_from_slice(&u16le(0xFFFF));
        out.extend_from_slice(&u16le(0xFFFF));
        out.extend_from_slice(&u32le(0xFFFFFFFF));
        out.extend_from_slice(&u32le(0xFFFFFFFF));
    } else {
        out.extend_from_slice(&u16le(entries.len() as u16));
        out.extend_from_slice(&u16le(entries.len() as u16));
        out.extend_from_slice(&u32le(cd_size as u32));
        out.extend_from_slice(&u32le(cd_start as u32));
    }
    out.extend_from_slice(&u16le(comment.len() as u16));
    out.extend_from_slice(comment);

    out
}

/// Byte source wrapper that counts raw reads, used to observe cache
/// behavior from the outside.
pub struct CountingReader<R: ReadAt> {
    inner: R,
    reads: AtomicU64,
}

impl<R: ReadAt> CountingReader<R> {
    pub fn new(inner: R) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicU64::new(0),
        })
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl<R: ReadAt> ReadAt for CountingReader<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}
