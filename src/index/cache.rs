use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::zip::records::RawFileHeader;

/// Number of parsed headers kept resident per archive.
pub const ENTRY_CACHE_SIZE: usize = 25;

/// Bounded, least-recently-used cache of parsed entry headers, keyed by
/// sorted slot index.
///
/// Purely advisory: a miss re-parses from the central directory, so
/// correctness never depends on cache contents. Both reads and writes count
/// as use. The internal lock keeps the eviction order coherent under
/// concurrent lookups.
pub struct EntryCache {
    entries: Mutex<LruCache<usize, Arc<RawFileHeader>>>,
}

impl EntryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, slot: usize) -> Option<Arc<RawFileHeader>> {
        self.lock().get(&slot).cloned()
    }

    pub fn put(&self, slot: usize, header: Arc<RawFileHeader>) {
        self.lock().put(slot, header);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<usize, Arc<RawFileHeader>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::records::CompressionMethod;

    fn header(name: &str) -> Arc<RawFileHeader> {
        Arc::new(RawFileHeader::new(
            name.as_bytes().to_vec(),
            0,
            CompressionMethod::Stored,
            0,
            0,
            0,
            0,
        ))
    }

    #[test]
    fn capacity_is_enforced_lru_first() {
        let cache = EntryCache::new(2);
        cache.put(0, header("a"));
        cache.put(1, header("b"));
        cache.get(0); // promote slot 0
        cache.put(2, header("c")); // evicts slot 1
        assert!(cache.get(0).is_some());
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = EntryCache::new(4);
        cache.put(0, header("a"));
        cache.clear();
        assert!(cache.get(0).is_none());
    }
}
