//! The packed buffer + offset table owned as one movable, appendable unit.

use crate::hash;
use crate::packer::{pack_strings, StringEntry};

/// One row of the string table: where a string lives in the storage buffer.
///
/// `offset` is a byte offset. `length` counts code units: bytes for ASCII
/// entries, 16-bit units for UTF-16 entries. Entries are immutable once
/// constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringTableEntry {
    offset: u32,
    length: u32,
    is_utf16: bool,
}

impl StringTableEntry {
    /// Creates an entry.
    pub fn new(offset: u32, length: u32, is_utf16: bool) -> Self {
        StringTableEntry {
            offset,
            length,
            is_utf16,
        }
    }

    /// Byte offset into the storage buffer.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Length in code units.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Whether the entry's data is little-endian UTF-16.
    pub fn is_utf16(&self) -> bool {
        self.is_utf16
    }

    /// Size of the entry's data in bytes.
    fn byte_len(&self) -> u32 {
        if self.is_utf16 {
            self.length * 2
        } else {
            self.length
        }
    }
}

/// Packing statistics reported by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    /// Total size the strings would occupy with no sharing, in bytes.
    pub unpacked_size: usize,
    /// Actual size of the packed buffer, in bytes.
    pub packed_size: usize,
}

/// A packed string buffer and its offset table.
///
/// The buffer holds the ASCII section first, then the UTF-16 section
/// (little-endian bytes) aligned to a 2-byte boundary. Produced once per
/// compilation unit (or delta batch) and consumed by the bytecode file
/// writer and the runtime loader.
#[derive(Debug, Default, Clone)]
pub struct ConsecutiveStringStorage {
    storage: Vec<u8>,
    table: Vec<StringTableEntry>,
}

impl ConsecutiveStringStorage {
    /// Packs `strings` and builds the table over the resulting buffer.
    ///
    /// With `optimize` set, substring containment and suffix/prefix overlap
    /// between strings are exploited to shrink the buffer; otherwise strings
    /// are laid out in input order.
    pub fn new<S: AsRef<str>>(strings: &[S], optimize: bool) -> Self {
        Self::new_with_stats(strings, optimize).0
    }

    /// Like [`ConsecutiveStringStorage::new`], also reporting packing stats.
    pub fn new_with_stats<S: AsRef<str>>(strings: &[S], optimize: bool) -> (Self, PackStats) {
        // Partition into ASCII strings (borrowed) and UTF-16 strings
        // (converted up front so the packer can borrow stable slices).
        let mut ascii_refs: Vec<(u32, &[u8])> = Vec::new();
        let mut u16_owned: Vec<(u32, Vec<u16>)> = Vec::new();
        for (index, s) in strings.iter().enumerate() {
            let s = s.as_ref();
            if s.is_ascii() {
                ascii_refs.push((index as u32, s.as_bytes()));
            } else {
                u16_owned.push((index as u32, s.encode_utf16().collect()));
            }
        }

        let mut ascii_entries: Vec<StringEntry<'_, u8>> = ascii_refs
            .iter()
            .map(|&(id, chars)| StringEntry::new(id, chars))
            .collect();
        let mut u16_entries: Vec<StringEntry<'_, u16>> = u16_owned
            .iter()
            .map(|(id, chars)| StringEntry::new(*id, chars.as_slice()))
            .collect();

        let unpacked_size = ascii_entries.iter().map(|e| e.chars.len()).sum::<usize>()
            + u16_entries.iter().map(|e| e.chars.len() * 2).sum::<usize>();

        let mut storage = pack_strings(&mut ascii_entries, optimize);
        let u16_storage = pack_strings(&mut u16_entries, optimize);

        // Append the UTF-16 section to the ASCII section.
        let u16_offset_adjust = append_u16_storage(&u16_storage, &mut storage);

        // Build the table over the combined storage, in original index order.
        let mut table = vec![StringTableEntry::default(); strings.len()];
        for entry in &ascii_entries {
            table[entry.string_id as usize] = StringTableEntry::new(
                entry.offset_in_storage.unwrap() as u32,
                entry.chars.len() as u32,
                false,
            );
        }
        for entry in &u16_entries {
            table[entry.string_id as usize] = StringTableEntry::new(
                (entry.offset_in_storage.unwrap() * 2 + u16_offset_adjust) as u32,
                entry.chars.len() as u32,
                true,
            );
        }

        let stats = PackStats {
            unpacked_size,
            packed_size: storage.len(),
        };
        (ConsecutiveStringStorage { storage, table }, stats)
    }

    /// Reassembles a storage unit from a persisted buffer and table.
    ///
    /// Used by the runtime loader; the parts must have been produced by this
    /// type. Entry bounds are validated in debug builds.
    pub fn from_parts(storage: Vec<u8>, table: Vec<StringTableEntry>) -> Self {
        if cfg!(debug_assertions) {
            for entry in &table {
                debug_assert!(
                    entry.offset() as usize + entry.byte_len() as usize <= storage.len(),
                    "string table entry past end of storage"
                );
            }
        }
        ConsecutiveStringStorage { storage, table }
    }

    /// Number of strings in the table.
    pub fn count(&self) -> usize {
        self.table.len()
    }

    /// Size of the packed buffer in bytes.
    pub fn storage_size(&self) -> usize {
        self.storage.len()
    }

    /// The packed buffer.
    pub fn storage_bytes(&self) -> &[u8] {
        &self.storage
    }

    /// The offset table.
    pub fn table(&self) -> &[StringTableEntry] {
        &self.table
    }

    /// Appends another storage unit.
    ///
    /// If this instance has never been used (empty table), it simply becomes
    /// `rhs`. Otherwise every incoming non-empty entry is re-offset by the
    /// current buffer length and the buffers are concatenated. Empty entries
    /// keep offset 0 so the canonical empty-string convention survives.
    pub fn append(&mut self, rhs: ConsecutiveStringStorage) {
        if self.table.is_empty() {
            *self = rhs;
            return;
        }
        let storage_delta = self.storage.len() as u32;
        self.table.reserve(rhs.table.len());
        for entry in &rhs.table {
            let offset = if entry.length() != 0 {
                entry.offset() + storage_delta
            } else {
                entry.offset()
            };
            self.table
                .push(StringTableEntry::new(offset, entry.length(), entry.is_utf16()));
        }
        self.storage.extend_from_slice(&rhs.storage);
    }

    /// Returns the string at table index `index`.
    ///
    /// ASCII entries are returned as a view into the storage buffer. UTF-16
    /// entries are transcoded into `scratch` on demand and returned from
    /// there; nothing is materialized eagerly.
    pub fn string_at_index<'a>(&'a self, index: usize, scratch: &'a mut String) -> &'a str {
        let entry = &self.table[index];
        let offset = entry.offset() as usize;
        debug_assert!(
            offset + entry.byte_len() as usize <= self.storage.len(),
            "string table entry past end of storage"
        );
        if !entry.is_utf16() {
            let bytes = &self.storage[offset..offset + entry.length() as usize];
            debug_assert!(bytes.is_ascii(), "non-ASCII bytes in ASCII entry");
            // SAFETY: the ASCII section only ever receives bytes < 0x80,
            // which are valid UTF-8.
            unsafe { std::str::from_utf8_unchecked(bytes) }
        } else {
            let units = decode_utf16_le(&self.storage[offset..offset + entry.byte_len() as usize]);
            scratch.clear();
            scratch.extend(char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));
            scratch
        }
    }

    /// Hashes the bytes of the entry at `index`.
    ///
    /// Used to build hash-based identifier lookup when a bytecode file is
    /// loaded.
    pub fn entry_hash(&self, index: usize) -> u32 {
        let entry = &self.table[index];
        let offset = entry.offset() as usize;
        debug_assert!(
            offset + entry.byte_len() as usize <= self.storage.len(),
            "string table entry past end of storage"
        );
        let data = &self.storage[offset..offset + entry.byte_len() as usize];
        if entry.is_utf16() {
            hash::hash_utf16(decode_utf16_le(data))
        } else {
            hash::hash_ascii(data)
        }
    }
}

/// Decodes a little-endian UTF-16 byte region into code units.
fn decode_utf16_le(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

/// Appends the UTF-16 section to `output` as little-endian bytes, aligned to
/// a 2-byte boundary. Returns the byte offset of the section.
fn append_u16_storage(u16_storage: &[u16], output: &mut Vec<u8>) -> usize {
    if u16_storage.is_empty() {
        // Nothing to do, don't even bother aligning.
        return 0;
    }
    if output.len() % 2 != 0 {
        output.push(0);
    }
    let offset = output.len();
    output.reserve(u16_storage.len() * 2);
    for unit in u16_storage {
        output.extend_from_slice(&unit.to_le_bytes());
    }
    offset
}
