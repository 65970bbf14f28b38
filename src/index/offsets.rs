/// Offsets to central directory records.
///
/// Regular zip files are backed by `u32` storage; zip64 files are backed by
/// `u64` and consume more memory. The representation is chosen once at
/// construction and never changes afterwards.
pub enum Offsets {
    Zip(Vec<u32>),
    Zip64(Vec<u64>),
}

impl Offsets {
    pub fn with_capacity(capacity: usize, zip64: bool) -> Self {
        if zip64 {
            Offsets::Zip64(Vec::with_capacity(capacity))
        } else {
            Offsets::Zip(Vec::with_capacity(capacity))
        }
    }

    pub fn push(&mut self, value: u64) {
        match self {
            Offsets::Zip(offsets) => offsets.push(value as u32),
            Offsets::Zip64(offsets) => offsets.push(value),
        }
    }

    pub fn get(&self, index: usize) -> u64 {
        match self {
            Offsets::Zip(offsets) => offsets[index] as u64,
            Offsets::Zip64(offsets) => offsets[index],
        }
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        match self {
            Offsets::Zip(offsets) => offsets.swap(i, j),
            Offsets::Zip64(offsets) => offsets.swap(i, j),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip64_storage_keeps_wide_offsets() {
        let mut offsets = Offsets::with_capacity(2, true);
        offsets.push(0x1_0000_0000);
        offsets.push(7);
        offsets.swap(0, 1);
        assert_eq!(offsets.get(0), 7);
        assert_eq!(offsets.get(1), 0x1_0000_0000);
    }
}
