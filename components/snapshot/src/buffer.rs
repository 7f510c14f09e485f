//! The memory-buffer abstraction backing a snapshot read.
//!
//! A snapshot is always fully resident before deserialization begins: either
//! an owned byte vector or a read-only file mapping. The deserializer
//! borrows the buffer for its entire lifetime, so the buffer outliving the
//! reconstructed runtime is enforced by the borrow checker rather than
//! documented as a caller obligation.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

/// Fully resident snapshot bytes.
pub enum MemoryBuffer {
    /// Bytes owned in memory.
    Owned(Vec<u8>),
    /// A read-only mapping of a snapshot file.
    Mapped(Mmap),
}

impl MemoryBuffer {
    /// Wraps an owned byte vector.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        MemoryBuffer::Owned(bytes)
    }

    /// Maps a snapshot file read-only.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and snapshot files are treated as
        // immutable artifacts once written.
        let map = unsafe { Mmap::map(&file)? };
        Ok(MemoryBuffer::Mapped(map))
    }

    /// The buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MemoryBuffer::Owned(v) => v,
            MemoryBuffer::Mapped(m) => m,
        }
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}
