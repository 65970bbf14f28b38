//! The entry index: a compact, searchable table over an archive's central
//! directory with on-demand content retrieval.
//!
//! [`ZipIndex::open`] performs a single forward scan over the central
//! directory, recording one `(name hash, header offset, position)` record per
//! entry in three parallel arrays sorted by hash. After the scan the index is
//! immutable; lookups binary-search the hash array and compare actual name
//! bytes, iteration replays discovery order through the inverse permutation,
//! and entry headers are re-parsed lazily through a small LRU cache.
//!
//! On top of the table the index layers the JAR conventions: multi-release
//! override resolution and lazy certification extraction.

mod cache;
mod offsets;
mod table;

pub use cache::ENTRY_CACHE_SIZE;

use cache::EntryCache;
use table::{EntryTable, hash_append, hash_name};

use std::io::{self, Read};
use std::sync::{Arc, OnceLock};

use flate2::read::DeflateDecoder;
use log::{debug, warn};

use crate::cert::{Certification, SignatureFile};
use crate::error::{Result, ZipError};
use crate::io::{ByteRange, RangeReader, ReadAt};
use crate::release::{
    BASE_VERSION, DEFAULT_RUNTIME_VERSION, MANIFEST_NAME, META_INF_PREFIX, VERSIONS_PREFIX,
    manifest_is_multi_release,
};
use crate::stream::{SequentialReader, StreamedEntry, verify_payload};
use crate::zip::parser::{CentralDirectoryVisitor, ZipParser, parse_header_at};
use crate::zip::records::{CompressionMethod, RawFileHeader};

/// Optional name filter applied while indexing.
///
/// Returning `None` suppresses the entry entirely (it is not indexed and can
/// never be looked up); returning a different name indexes the entry under
/// that name. Nested-archive callers use this to hide an inner archive's own
/// descriptor entries or to strip path prefixes.
pub type EntryFilter = dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync;

/// Largest buffer [`ZipIndex::read`] preallocates up front (1 MiB); larger
/// payloads grow the buffer as bytes actually arrive.
const READ_SIZE_HINT_CEILING: u64 = 1 << 20;

/// Check invoked at the start of every iteration step; an owning handle can
/// use it to fail iteration once the archive is closed.
pub type Validator<'a> = Box<dyn Fn() -> Result<()> + Send + 'a>;

/// A resolved archive entry.
///
/// The logical name can differ from the stored name when the entry was
/// resolved through a multi-release override: callers see the name they asked
/// for, while [`raw_name`](Entry::raw_name) keeps the versioned path.
#[derive(Debug, Clone)]
pub struct Entry {
    slot: usize,
    name: String,
    header: Arc<RawFileHeader>,
}

impl Entry {
    fn new(slot: usize, header: Arc<RawFileHeader>, alias: Option<&str>) -> Self {
        let name = match alias {
            Some(alias) => alias.to_string(),
            None => header.name_str().into_owned(),
        };
        Self { slot, name, header }
    }

    /// Sorted slot of this entry within the index.
    pub fn index(&self) -> usize {
        self.slot
    }

    /// Logical entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name bytes exactly as stored in the central directory.
    pub fn raw_name(&self) -> &[u8] {
        self.header.name()
    }

    pub fn method(&self) -> CompressionMethod {
        self.header.method
    }

    pub fn compressed_size(&self) -> u64 {
        self.header.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.header.uncompressed_size
    }

    pub fn crc32(&self) -> u32 {
        self.header.crc32
    }

    pub fn is_directory(&self) -> bool {
        self.header.is_directory()
    }

    pub fn local_header_offset(&self) -> u64 {
        self.header.local_header_offset
    }
}

/// Random-access index over all entries of a ZIP/JAR archive.
pub struct ZipIndex<R: ReadAt> {
    reader: Arc<R>,
    parser: ZipParser<R>,
    central_directory: ByteRange<R>,
    table: EntryTable,
    cache: EntryCache,
    filter: Option<Box<EntryFilter>>,
    runtime_version: u32,
    multi_release: OnceLock<bool>,
    certifications: OnceLock<Box<[Option<Certification>]>>,
}

/// Visitor assembling the entry table during the central-directory scan.
struct IndexBuilder<'a> {
    table: Option<EntryTable>,
    filter: Option<&'a EntryFilter>,
}

impl CentralDirectoryVisitor for IndexBuilder<'_> {
    fn visit_start(&mut self, total_entries: u64, zip64: bool) {
        self.table = Some(EntryTable::with_capacity(total_entries as usize, zip64));
    }

    fn visit_header(&mut self, header: &RawFileHeader, offset: u64) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        match self.filter {
            None => table.push(hash_name(header.name()), offset),
            Some(filter) => {
                if let Some(name) = filter(header.name()) {
                    table.push(hash_name(&name), offset);
                }
            }
        }
    }

    fn visit_end(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.finish();
        }
    }
}

impl<R: ReadAt> ZipIndex<R> {
    /// Open an archive and build its index in one pass.
    pub fn open(reader: Arc<R>) -> Result<Self> {
        Self::open_filtered(reader, None)
    }

    /// Open an archive with an entry filter applied while indexing.
    pub fn open_filtered(reader: Arc<R>, filter: Option<Box<EntryFilter>>) -> Result<Self> {
        let parser = ZipParser::new(Arc::clone(&reader));
        let mut builder = IndexBuilder {
            table: None,
            filter: filter.as_deref(),
        };
        let central_directory = parser.scan(&mut builder)?;
        let table = builder
            .table
            .take()
            .unwrap_or_else(|| EntryTable::with_capacity(0, false));
        debug!("indexed {} entries", table.len());

        Ok(Self {
            reader,
            parser,
            central_directory,
            table,
            cache: EntryCache::new(ENTRY_CACHE_SIZE),
            filter,
            runtime_version: DEFAULT_RUNTIME_VERSION,
            multi_release: OnceLock::new(),
            certifications: OnceLock::new(),
        })
    }

    /// Set the probe ceiling for multi-release resolution.
    pub fn with_runtime_version(mut self, version: u32) -> Self {
        self.runtime_version = version;
        self
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The underlying byte source.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Find an entry by name, resolving multi-release overrides.
    ///
    /// A plain miss also retries with a trailing `/` so directory entries
    /// resolve without the caller knowing the name denotes a directory. For
    /// multi-release archives the versioned override under
    /// `META-INF/versions/<v>/` wins over the direct entry, highest
    /// applicable version first, and is returned aliased under `name`.
    pub fn lookup(&self, name: &str) -> Result<Option<Entry>> {
        let entry = self.lookup_direct(name, None, true)?;
        if !name.starts_with(META_INF_PREFIX) && self.is_multi_release() {
            let mut version = self.runtime_version;
            while version > BASE_VERSION {
                let versioned = format!("{VERSIONS_PREFIX}{version}/{name}");
                if let Some(found) = self.lookup_direct(&versioned, Some(name), true)? {
                    return Ok(Some(found));
                }
                version -= 1;
            }
        }
        Ok(entry)
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)?.is_some())
    }

    /// Lookup without multi-release resolution.
    fn lookup_direct(&self, name: &str, alias: Option<&str>, cache_entry: bool) -> Result<Option<Entry>> {
        let hash = hash_name(name.as_bytes());
        if let Some(entry) = self.find_in_run(hash, name, None, alias, cache_entry)? {
            return Ok(Some(entry));
        }
        let hash = hash_append(hash, b'/');
        self.find_in_run(hash, name, Some(b'/'), alias, cache_entry)
    }

    /// Scan the run of slots sharing `hash`, comparing actual names; hash
    /// collisions are expected to be rare but must all be checked.
    fn find_in_run(
        &self,
        hash: u32,
        name: &str,
        suffix: Option<u8>,
        alias: Option<&str>,
        cache_entry: bool,
    ) -> Result<Option<Entry>> {
        let Some(mut slot) = self.table.first_slot(hash) else {
            return Ok(None);
        };
        while slot < self.table.len() && self.table.hash_at(slot) == hash {
            let header = self.header_at(slot, cache_entry)?;
            if header.has_name(name.as_bytes(), suffix) {
                return Ok(Some(Entry::new(slot, header, alias)));
            }
            slot += 1;
        }
        Ok(None)
    }

    /// Parsed header for a slot, through the cache.
    fn header_at(&self, slot: usize, cache_entry: bool) -> Result<Arc<RawFileHeader>> {
        if let Some(header) = self.cache.get(slot) {
            return Ok(header);
        }
        let (mut header, _) = parse_header_at(&self.central_directory, self.table.offset_at(slot))?;
        if let Some(filter) = &self.filter {
            match filter(header.name()) {
                Some(name) => header.rename(name),
                // Indexed slots passed the filter during the scan, so a
                // rejection here means the filter is not a pure function.
                None => return Err(ZipError::format("Indexed entry rejected by filter")),
            }
        }
        let header = Arc::new(header);
        if cache_entry {
            self.cache.put(slot, Arc::clone(&header));
        }
        Ok(header)
    }

    fn entry_at(&self, slot: usize, cache_entry: bool) -> Result<Entry> {
        let header = self.header_at(slot, cache_entry)?;
        Ok(Entry::new(slot, header, None))
    }

    /// Byte range of an entry's (still possibly compressed) payload.
    ///
    /// The local header is re-read to pick up name/extra lengths that differ
    /// from the central directory copy. The range reads lazily; for a stored
    /// nested archive it can be opened directly as another [`ZipIndex`].
    pub fn data_range(&self, entry: &Entry) -> Result<ByteRange<R>> {
        self.parser
            .payload_range(entry.local_header_offset(), entry.compressed_size())
    }

    /// Open an entry's content as a byte stream, inflating deflated payloads.
    pub fn open_stream(&self, entry: &Entry) -> Result<EntryReader<R>> {
        let range = self.data_range(entry)?;
        let inner = match entry.method() {
            CompressionMethod::Stored => EntryReaderInner::Stored(range.stream()),
            CompressionMethod::Deflate => EntryReaderInner::Deflated(
                DeflateDecoder::new(range.stream()).take(entry.uncompressed_size()),
            ),
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::format(format!(
                    "Unsupported compression method: {method}"
                )));
            }
        };
        Ok(EntryReader { inner })
    }

    /// Read an entry's content fully into memory.
    pub fn read(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut stream = self.open_stream(entry)?;
        // The declared size is an untrusted header field; cap the
        // preallocation and let the buffer grow to the real length.
        let hint = entry.uncompressed_size().min(READ_SIZE_HINT_CEILING) as usize;
        let mut buf = Vec::with_capacity(hint);
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Drop all cached entry headers (the index itself stays valid).
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Iterate entries in central-directory discovery order.
    pub fn entries(&self) -> Entries<'_, R> {
        Entries {
            index: self,
            position: 0,
            validator: None,
        }
    }

    /// Iterate with a check invoked at the start of each step.
    pub fn entries_validated<'a>(&'a self, validator: Validator<'a>) -> Entries<'a, R> {
        Entries {
            index: self,
            position: 0,
            validator: Some(validator),
        }
    }

    /// Whether the archive's manifest marks it multi-release.
    ///
    /// Computed once and memoized; a manifest read failure is treated as
    /// "not multi-release" rather than surfaced, since resolution is an
    /// enrichment on top of plain lookups.
    pub fn is_multi_release(&self) -> bool {
        *self.multi_release.get_or_init(|| match self.read_manifest() {
            Ok(Some(manifest)) => manifest_is_multi_release(&manifest),
            Ok(None) => false,
            Err(err) => {
                warn!("manifest read failed, treating archive as single-release: {err}");
                false
            }
        })
    }

    fn read_manifest(&self) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.lookup_direct(MANIFEST_NAME, None, false)? else {
            return Ok(None);
        };
        self.read(&entry).map(Some)
    }

    /// Signing metadata for an entry, or the "none" sentinel.
    ///
    /// The first call streams the archive once to correlate entries with the
    /// archive's signature block files; the result is memoized. A failure of
    /// the whole streaming pass leaves every entry uncertified and never
    /// affects ordinary lookups.
    pub fn certification(&self, entry: &Entry) -> Certification {
        let table = self.certifications.get_or_init(|| {
            match self.compute_certifications() {
                Ok(certifications) => certifications.into_boxed_slice(),
                Err(err) => {
                    warn!("certification scan failed, treating entries as uncertified: {err}");
                    vec![None; self.table.len()].into_boxed_slice()
                }
            }
        });
        table
            .get(entry.index())
            .cloned()
            .flatten()
            .unwrap_or_else(Certification::none)
    }

    fn compute_certifications(&self) -> Result<Vec<Option<Certification>>> {
        let mut certifications: Vec<Option<Certification>> = vec![None; self.table.len()];
        let signers = self.collect_signature_files()?;
        if signers.is_empty() {
            debug!("no signature block files, all entries uncertified");
            return Ok(certifications);
        }
        let certification = Certification::new(signers);

        let mut stream = SequentialReader::new(ByteRange::whole(Arc::clone(&self.reader)));
        while let Some(streamed) = stream.next_entry()? {
            match self.lookup_direct(&streamed.name_str(), None, false)? {
                Some(related) => {
                    if self.streamed_matches(&stream, &streamed, &related) {
                        certifications[related.index()] = Some(certification.clone());
                    }
                    stream.advance(&streamed, related.compressed_size())?;
                }
                None => {
                    if streamed.has_descriptor() && streamed.compressed_size == 0 {
                        return Err(ZipError::format(
                            "Cannot skip unindexed entry with data descriptor",
                        ));
                    }
                    stream.advance(&streamed, streamed.compressed_size)?;
                }
            }
        }
        Ok(certifications)
    }

    /// Correlate a streamed entry with its indexed counterpart: directory
    /// flag and method must agree and the decompressed stream must verify
    /// against the indexed size and CRC. Per-entry failures are swallowed;
    /// the entry simply stays uncertified.
    fn streamed_matches(
        &self,
        stream: &SequentialReader<R>,
        streamed: &StreamedEntry,
        related: &Entry,
    ) -> bool {
        if streamed.is_directory() != related.is_directory()
            || streamed.method != related.method()
        {
            return false;
        }
        let verified = stream
            .payload(streamed, related.compressed_size())
            .and_then(|payload| {
                verify_payload(
                    &payload,
                    related.method(),
                    related.uncompressed_size(),
                    related.crc32(),
                )
            });
        match verified {
            Ok(verified) => verified,
            Err(err) => {
                debug!("stream verification failed for {}: {err}", related.name());
                false
            }
        }
    }

    fn collect_signature_files(&self) -> Result<Vec<SignatureFile>> {
        let mut signers = Vec::new();
        for slot in 0..self.table.len() {
            let header = self.header_at(slot, false)?;
            if !is_signature_block(header.name()) {
                continue;
            }
            let entry = Entry::new(slot, header, None);
            let block = self.read(&entry)?;
            signers.push(SignatureFile {
                name: entry.name().to_string(),
                block,
            });
        }
        Ok(signers)
    }
}

/// Signature block files live directly under `META-INF/`.
fn is_signature_block(name: &[u8]) -> bool {
    let Some(rest) = name.strip_prefix(META_INF_PREFIX.as_bytes()) else {
        return false;
    };
    if rest.contains(&b'/') {
        return false;
    }
    let rest = rest.to_ascii_lowercase();
    rest.ends_with(b".rsa") || rest.ends_with(b".dsa") || rest.ends_with(b".ec")
}

/// Lazy, restartable iterator over entries in discovery order.
pub struct Entries<'a, R: ReadAt> {
    index: &'a ZipIndex<R>,
    position: usize,
    validator: Option<Validator<'a>>,
}

impl<R: ReadAt> Iterator for Entries<'_, R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(validator) = &self.validator
            && let Err(err) = validator()
        {
            return Some(Err(err));
        }
        if self.position >= self.index.len() {
            return None;
        }
        let slot = self.index.table.slot_of_position(self.position);
        self.position += 1;
        Some(self.index.entry_at(slot, false))
    }
}

/// Byte stream over a single entry's content.
pub struct EntryReader<R: ReadAt> {
    inner: EntryReaderInner<R>,
}

enum EntryReaderInner<R: ReadAt> {
    Stored(RangeReader<R>),
    Deflated(io::Take<DeflateDecoder<RangeReader<R>>>),
}

impl<R: ReadAt> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            EntryReaderInner::Stored(reader) => reader.read(buf),
            EntryReaderInner::Deflated(reader) => reader.read(buf),
        }
    }
}
