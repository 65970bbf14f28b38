//! The sorted parallel-array entry table.
//!
//! Entry details are deliberately not boxed into per-entry objects: the table
//! keeps three parallel arrays (name hash, central-directory offset, original
//! position), sorted jointly by hash so a binary search can find a name. A
//! typical application archive holds tens of thousands of entries, and the
//! flat arrays keep that index within a couple hundred kilobytes.

use super::offsets::Offsets;

/// Hash of a name computed directly from its raw bytes, without constructing
/// a string: `h = h * 31 + byte`, wrapping.
pub fn hash_name(name: &[u8]) -> u32 {
    name.iter().fold(0u32, |h, b| hash_append(h, *b))
}

/// Extend a running name hash by one byte (used for the `name + "/"` probe).
pub fn hash_append(hash: u32, byte: u8) -> u32 {
    hash.wrapping_mul(31).wrapping_add(byte as u32)
}

/// Parallel arrays over all indexed entries.
///
/// After [`finish`](EntryTable::finish) the table is immutable: `hashes` is
/// sorted ascending, `offsets` moved in lock-step with every sort swap, and
/// `positions` is the inverse permutation of the sort so that
/// `positions[original_order] == sorted_slot`.
pub struct EntryTable {
    hashes: Vec<u32>,
    offsets: Offsets,
    positions: Vec<u32>,
}

impl EntryTable {
    pub fn with_capacity(capacity: usize, zip64: bool) -> Self {
        Self {
            hashes: Vec::with_capacity(capacity),
            offsets: Offsets::with_capacity(capacity, zip64),
            positions: Vec::with_capacity(capacity),
        }
    }

    /// Number of indexed entries. May be lower than the archive's declared
    /// count when a filter suppressed entries.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Append one entry in discovery order.
    pub fn push(&mut self, hash: u32, offset: u64) {
        self.positions.push(self.hashes.len() as u32);
        self.hashes.push(hash);
        self.offsets.push(offset);
    }

    /// Sort the three arrays jointly by hash, then rebuild `positions` as the
    /// inverse permutation so iteration can reproduce discovery order.
    pub fn finish(&mut self) {
        if !self.hashes.is_empty() {
            self.sort(0, self.hashes.len() as isize - 1);
        }
        let sorted = std::mem::take(&mut self.positions);
        self.positions = vec![0u32; sorted.len()];
        for (slot, original) in sorted.iter().enumerate() {
            self.positions[*original as usize] = slot as u32;
        }
    }

    // Quick sort, uses hashes as the source but swaps all arrays together.
    fn sort(&mut self, left: isize, right: isize) {
        if left < right {
            let pivot = self.hashes[(left + (right - left) / 2) as usize];
            let mut i = left;
            let mut j = right;
            while i <= j {
                while self.hashes[i as usize] < pivot {
                    i += 1;
                }
                while self.hashes[j as usize] > pivot {
                    j -= 1;
                }
                if i <= j {
                    self.swap(i as usize, j as usize);
                    i += 1;
                    j -= 1;
                }
            }
            if left < j {
                self.sort(left, j);
            }
            if right > i {
                self.sort(i, right);
            }
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.hashes.swap(i, j);
        self.offsets.swap(i, j);
        self.positions.swap(i, j);
    }

    pub fn hash_at(&self, slot: usize) -> u32 {
        self.hashes[slot]
    }

    pub fn offset_at(&self, slot: usize) -> u64 {
        self.offsets.get(slot)
    }

    /// Sorted slot holding the entry discovered at `position`.
    pub fn slot_of_position(&self, position: usize) -> usize {
        self.positions[position] as usize
    }

    /// First sorted slot whose hash equals `hash`.
    ///
    /// A binary search can land anywhere inside a run of equal hashes, so
    /// walk back to the run's first element; collisions must all be checked
    /// by the caller.
    pub fn first_slot(&self, hash: u32) -> Option<usize> {
        let mut slot = self.hashes.binary_search(&hash).ok()?;
        while slot > 0 && self.hashes[slot - 1] == hash {
            slot -= 1;
        }
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(hashes: &[u32]) -> EntryTable {
        let mut table = EntryTable::with_capacity(hashes.len(), false);
        for (i, hash) in hashes.iter().enumerate() {
            table.push(*hash, i as u64 * 100);
        }
        table.finish();
        table
    }

    #[test]
    fn hashes_sorted_and_offsets_follow() {
        let table = table_of(&[50, 10, 40, 10, 30]);
        for slot in 1..table.len() {
            assert!(table.hash_at(slot - 1) <= table.hash_at(slot));
        }
        // Each offset must still pair with its original hash.
        for slot in 0..table.len() {
            let original = (table.offset_at(slot) / 100) as usize;
            assert_eq!(table.hash_at(slot), [50, 10, 40, 10, 30][original]);
        }
    }

    #[test]
    fn positions_invert_the_sort() {
        let hashes = [9u32, 3, 7, 1, 5];
        let table = table_of(&hashes);
        for position in 0..hashes.len() {
            let slot = table.slot_of_position(position);
            assert_eq!(table.hash_at(slot), hashes[position]);
            assert_eq!(table.offset_at(slot), position as u64 * 100);
        }
    }

    #[test]
    fn first_slot_walks_back_through_collision_runs() {
        let table = table_of(&[20, 10, 10, 10, 30]);
        let first = table.first_slot(10).unwrap();
        assert_eq!(first, 0);
        assert_eq!(table.hash_at(first + 2), 10);
        assert_eq!(table.hash_at(first + 3), 20);
        assert!(table.first_slot(15).is_none());
    }

    #[test]
    fn byte_hash_matches_suffix_append() {
        let direct = hash_name(b"dir/");
        let appended = hash_append(hash_name(b"dir"), b'/');
        assert_eq!(direct, appended);
        // "Aa" and "BB" collide under the 31-based hash.
        assert_eq!(hash_name(b"Aa"), hash_name(b"BB"));
        assert_ne!(hash_name(b"Aa"), hash_name(b"Ab"));
    }
}
