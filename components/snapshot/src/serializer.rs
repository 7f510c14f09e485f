//! The snapshot writer.
//!
//! Produces the stream in three strictly sequential phases: the header, the
//! entity stream, and the epilogue. Strings referenced by entities are not
//! inlined; their bytes go to one of two side-buffers (ASCII and UTF-16) and
//! only a 4-byte offset is written at the cursor, so a string reused across
//! fields costs its bytes once.
//!
//! Pointers never appear in the stream. Every distinct address earns a dense
//! relocation ID the first time it is seen, and the ID is written in the
//! pointer's place. ID 0 is reserved for the null pointer. ID assignment
//! follows the caller's traversal order, so the reader must walk entities in
//! exactly the same order or relocation will resolve to the wrong objects.

use std::collections::HashMap;

use core_types::{SmallValue, TaggedValue};
use memory_manager::Heap;

use crate::header::SerializeHeader;
use crate::primitives::StreamInt;

/// Writes one snapshot stream.
pub struct Serializer<'a> {
    heap: &'a Heap,
    stream: Vec<u8>,
    /// Side-buffer for ASCII string data.
    ascii_pool: Vec<u8>,
    /// Side-buffer for UTF-16 string data, as little-endian bytes.
    u16_pool: Vec<u8>,
    /// Address -> relocation ID, seeded with the null mapping.
    relocation_map: HashMap<usize, u32>,
    next_id: u32,
}

impl<'a> Serializer<'a> {
    /// Starts a stream for `heap`'s runtime: writes the header immediately.
    pub fn new(heap: &'a Heap) -> Self {
        let mut relocation_map = HashMap::new();
        relocation_map.insert(0usize, 0u32);
        let mut serializer = Serializer {
            heap,
            stream: Vec::new(),
            ascii_pool: Vec::new(),
            u16_pool: Vec::new(),
            relocation_map,
            next_id: 1,
        };
        SerializeHeader::for_runtime(heap.config()).write(&mut serializer.stream);
        serializer
    }

    /// The heap this stream is being written from.
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Writes a primitive integer at the cursor.
    pub fn write_int<T: StreamInt>(&mut self, value: T) {
        value.write_to(&mut self.stream);
    }

    /// Binary-copies a raw byte range at the cursor.
    pub fn write_data(&mut self, bytes: &[u8]) {
        self.stream.extend_from_slice(bytes);
    }

    /// Appends an ASCII string to the side-buffer and writes its offset.
    ///
    /// The length is not recorded here; callers serialize it alongside.
    pub fn write_char_str(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.is_ascii(), "non-ASCII bytes in ASCII side-buffer");
        let offset = self.ascii_pool.len() as u32;
        self.ascii_pool.extend_from_slice(bytes);
        self.write_int::<u32>(offset);
    }

    /// Appends a UTF-16 string to the side-buffer (little-endian bytes) and
    /// writes its byte offset.
    pub fn write_char16_str(&mut self, units: &[u16]) {
        let offset = self.u16_pool.len() as u32;
        for unit in units {
            self.u16_pool.extend_from_slice(&unit.to_le_bytes());
        }
        self.write_int::<u32>(offset);
    }

    /// Looks up or allocates the relocation ID for `addr`.
    ///
    /// IDs are assigned in first-seen order starting at 1; the mapping for
    /// an address never changes within a stream.
    fn lookup_object(&mut self, addr: usize) -> u32 {
        if let Some(&id) = self.relocation_map.get(&addr) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.relocation_map.insert(addr, id);
        id
    }

    /// Writes the relocation ID standing in for `addr`.
    pub fn write_relocation(&mut self, addr: usize) {
        let id = self.lookup_object(addr);
        self.write_int::<u32>(id);
    }

    /// Terminates an entity by relocating its own address.
    ///
    /// This is what gives earlier entities' forward references to this one
    /// something to resolve against on the read side.
    pub fn end_object(&mut self, addr: usize) {
        debug_assert!(addr != 0, "an entity cannot live at the null address");
        self.write_relocation(addr);
    }

    /// Writes a tagged value, substituting a relocation ID for any pointer
    /// payload.
    ///
    /// `is_native_ptr` marks values whose payload is a native pointer even
    /// though the tag does not say so; they are relocated like any pointer.
    pub fn write_tagged_value(&mut self, value: TaggedValue, is_native_ptr: bool) {
        if value.is_pointer() || is_native_ptr {
            let id = self.lookup_object(value.payload() as usize);
            self.write_int::<u64>(value.with_payload(id as u64).raw());
        } else {
            self.write_int::<u64>(value.raw());
        }
    }

    /// Writes a compressed value, substituting a relocation ID for any
    /// pointer payload.
    ///
    /// The ID is stored shifted into the offset field, which bounds a single
    /// stream to 2^29 - 1 relocatable addresses reachable from compressed
    /// values.
    pub fn write_small_value(&mut self, value: SmallValue) {
        if value.is_pointer() {
            let addr = self.heap.decompress(value.pointer_offset());
            let id = self.lookup_object(addr);
            debug_assert!(id < (1 << 29), "relocation id overflows a compressed value");
            self.write_int::<u32>(value.with_pointer_offset(id << 3).raw());
        } else {
            self.write_int::<u32>(value.raw());
        }
    }

    /// Count of distinct addresses seen so far, including the null slot.
    pub fn relocation_map_size(&self) -> u32 {
        self.next_id
    }

    /// Flushes the side-buffers and the relocation-map size, finishing the
    /// stream. Consuming `self` makes "exactly once, last" structural.
    pub fn write_epilogue(mut self) -> Vec<u8> {
        let ascii_pool = std::mem::take(&mut self.ascii_pool);
        self.write_data(&ascii_pool);
        self.write_int::<u32>(ascii_pool.len() as u32);

        let u16_pool = std::mem::take(&mut self.u16_pool);
        self.write_data(&u16_pool);
        self.write_int::<u32>(u16_pool.len() as u32);

        self.write_int::<u32>(self.next_id);
        self.stream
    }
}
