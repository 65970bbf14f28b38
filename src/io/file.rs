use std::fs::File;
use std::path::Path;

use super::ReadAt;
use crate::error::Result;

/// Local file reader with random access support.
pub struct FileReader {
    file: File,
    size: u64,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl ReadAt for FileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            // No pread outside unix; seek-and-read through a fresh handle so
            // concurrent readers cannot race on the shared cursor.
            let mut file = self.file.try_clone()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)?;
            Ok(())
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
