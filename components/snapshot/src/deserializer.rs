//! The snapshot reader.
//!
//! Initialization validates the header, then locates the epilogue by
//! reading backward from the end of the buffer (relocation-map size, then
//! the UTF-16 and ASCII side-buffers with their lengths) before any forward
//! sequential reading begins. The object table is sized from the map with
//! slot 0 pre-resolved to the null pointer.
//!
//! During the forward pass, every relocation ID whose object has already
//! been bound is applied immediately; the rest are queued and applied in one
//! flush after the entire entity stream has been read. An ID that is still
//! unresolved at flush time means the stream is corrupt or the writer and
//! reader walked entities in different orders; both are unrecoverable.

use core_types::{fatal_error, SmallValue, TaggedValue};
use memory_manager::Heap;

use crate::header::{SerializeHeader, HEADER_BYTE_SIZE};
use crate::primitives::StreamInt;
use crate::relocation::RelocationKind;

/// A reference read before its target was materialized.
struct ForwardRef {
    /// Address of the field awaiting the resolved pointer.
    target: *mut u8,
    id: u32,
    kind: RelocationKind,
}

/// Reads one snapshot stream into a heap.
pub struct Deserializer<'a> {
    buffer: &'a [u8],
    cursor: usize,
    /// End of the entity stream (start of the ASCII side-buffer).
    entity_end: usize,
    ascii_pool: &'a [u8],
    u16_pool: &'a [u8],
    heap: &'a mut Heap,
    /// Relocation ID -> reconstructed address; 0 means not yet materialized
    /// (slot 0 is the null pointer and is born resolved).
    object_table: Vec<usize>,
    forward_refs: Vec<ForwardRef>,
}

impl<'a> Deserializer<'a> {
    /// Validates the header and reconstructs the side-buffers and object
    /// table. Any header mismatch or malformed epilogue is fatal.
    pub fn new(buffer: &'a [u8], heap: &'a mut Heap) -> Deserializer<'a> {
        let header = match SerializeHeader::read(buffer) {
            Some(header) => header,
            None => fatal_error("snapshot too short to hold a header"),
        };
        if let Err(mismatch) = header.validate(heap.config()) {
            fatal_error(&mismatch.to_string());
        }

        // Trailer: ..., ascii bytes, ascii len, u16 bytes, u16 len, map size.
        let trailer_min = HEADER_BYTE_SIZE + 12;
        if buffer.len() < trailer_min {
            fatal_error("snapshot too short to hold an epilogue");
        }
        let map_size = u32::read_from(&buffer[buffer.len() - 4..]) as usize;
        let u16_len_pos = buffer.len() - 8;
        let u16_len = u32::read_from(&buffer[u16_len_pos..]) as usize;
        let Some(u16_start) = u16_len_pos.checked_sub(u16_len) else {
            fatal_error("snapshot UTF-16 side-buffer overruns the stream");
        };
        let Some(ascii_len_pos) = u16_start.checked_sub(4) else {
            fatal_error("snapshot epilogue overruns the stream");
        };
        let ascii_len = u32::read_from(&buffer[ascii_len_pos..]) as usize;
        let Some(ascii_start) = ascii_len_pos.checked_sub(ascii_len) else {
            fatal_error("snapshot ASCII side-buffer overruns the stream");
        };
        if ascii_start < HEADER_BYTE_SIZE {
            fatal_error("snapshot side-buffers overlap the header");
        }
        if map_size == 0 {
            fatal_error("snapshot relocation map lost its null slot");
        }

        Deserializer {
            buffer,
            cursor: HEADER_BYTE_SIZE,
            entity_end: ascii_start,
            ascii_pool: &buffer[ascii_start..ascii_len_pos],
            u16_pool: &buffer[u16_start..u16_len_pos],
            heap,
            object_table: vec![0; map_size],
            forward_refs: Vec::new(),
        }
    }

    /// The heap being deserialized into.
    pub fn heap_mut(&mut self) -> &mut Heap {
        self.heap
    }

    /// Number of relocation IDs in this stream, including the null slot.
    pub fn object_table_size(&self) -> usize {
        self.object_table.len()
    }

    /// Number of references still waiting for their target.
    pub fn pending_relocations(&self) -> usize {
        self.forward_refs.len()
    }

    /// Reads a primitive integer at the cursor.
    pub fn read_int<T: StreamInt>(&mut self) -> T {
        let end = self.cursor + T::SIZE;
        if end > self.entity_end {
            fatal_error("snapshot read past the end of the entity stream");
        }
        let value = T::read_from(&self.buffer[self.cursor..end]);
        self.cursor = end;
        value
    }

    /// Reads `len` raw bytes at the cursor.
    pub fn read_data(&mut self, len: usize) -> &'a [u8] {
        let Some(end) = self.cursor.checked_add(len) else {
            fatal_error("snapshot read length overflows");
        };
        if end > self.entity_end {
            fatal_error("snapshot read past the end of the entity stream");
        }
        let bytes = &self.buffer[self.cursor..end];
        self.cursor = end;
        bytes
    }

    /// Reads `count` integers at the cursor.
    pub fn read_array<T: StreamInt>(&mut self, count: usize) -> Vec<T> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_int::<T>());
        }
        values
    }

    /// Reads a side-buffer offset and returns `len` ASCII bytes from it.
    pub fn read_char_str(&mut self, len: usize) -> &'a [u8] {
        let offset = self.read_int::<u32>() as usize;
        let Some(end) = offset.checked_add(len) else {
            fatal_error("snapshot string length overflows");
        };
        if end > self.ascii_pool.len() {
            fatal_error("snapshot string past the end of the ASCII side-buffer");
        }
        &self.ascii_pool[offset..end]
    }

    /// Reads a side-buffer byte offset and decodes `len` UTF-16 units.
    pub fn read_char16_str(&mut self, len: usize) -> Vec<u16> {
        let offset = self.read_int::<u32>() as usize;
        let Some(end) = offset.checked_add(len * 2) else {
            fatal_error("snapshot string length overflows");
        };
        if end > self.u16_pool.len() {
            fatal_error("snapshot string past the end of the UTF-16 side-buffer");
        }
        self.u16_pool[offset..end]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn check_id(&self, id: u32) {
        if id as usize >= self.object_table.len() {
            fatal_error(&format!(
                "snapshot relocation id {id} out of range (map size {})",
                self.object_table.len()
            ));
        }
    }

    /// Whether `id` can be applied right now. ID 0 is always resolved, to
    /// the null pointer.
    fn is_resolved(&self, id: u32) -> bool {
        id == 0 || self.object_table[id as usize] != 0
    }

    fn resolve(&self, id: u32) -> usize {
        self.object_table[id as usize]
    }

    /// Writes `addr` into the field at `target` according to `kind`.
    ///
    /// # Safety
    ///
    /// `target` must point at a live field of the representation `kind`
    /// names, with no other live reference to it.
    unsafe fn apply(&mut self, target: *mut u8, addr: usize, kind: RelocationKind) {
        match kind {
            RelocationKind::NativePointer => {
                *(target as *mut usize) = addr;
            }
            RelocationKind::GcPointer => {
                self.heap.barriered_store(target as *mut usize, addr);
            }
            RelocationKind::TaggedValue => {
                let slot = target as *mut TaggedValue;
                *slot = (*slot).with_payload(addr as u64);
            }
            RelocationKind::SmallValue => {
                let slot = target as *mut SmallValue;
                let offset = self.heap.compress(addr);
                *slot = (*slot).with_pointer_offset(offset);
            }
        }
    }

    fn apply_or_queue(&mut self, target: *mut u8, id: u32, kind: RelocationKind) {
        self.check_id(id);
        if self.is_resolved(id) {
            let addr = self.resolve(id);
            // SAFETY: deferred to the caller's contract on `target`.
            unsafe { self.apply(target, addr, kind) };
        } else {
            self.forward_refs.push(ForwardRef { target, id, kind });
        }
    }

    /// Reads a relocation ID and applies it to the pointer field at
    /// `target`, or queues it.
    ///
    /// # Safety
    ///
    /// `target` must point at a live field of the representation `kind`
    /// names, and must remain valid until the queue is flushed.
    pub unsafe fn read_relocation(&mut self, target: *mut u8, kind: RelocationKind) {
        let id = self.read_int::<u32>();
        self.apply_or_queue(target, id, kind);
    }

    /// Reads a tagged value into `target`, resolving any pointer payload.
    ///
    /// `is_native_ptr` must match the flag passed by the writer.
    ///
    /// # Safety
    ///
    /// `target` must point at a live `TaggedValue` slot, and must remain
    /// valid until the queue is flushed.
    pub unsafe fn read_tagged_value(&mut self, target: *mut TaggedValue, is_native_ptr: bool) {
        let value = TaggedValue::from_raw(self.read_int::<u64>());
        *target = value;
        if value.is_pointer() || is_native_ptr {
            let id = value.payload();
            debug_assert!(id <= u32::MAX as u64, "relocation id overflows 32 bits");
            self.apply_or_queue(target as *mut u8, id as u32, RelocationKind::TaggedValue);
        }
    }

    /// Reads a compressed value into `target`, resolving any pointer
    /// payload.
    ///
    /// # Safety
    ///
    /// `target` must point at a live `SmallValue` slot, and must remain
    /// valid until the queue is flushed.
    pub unsafe fn read_small_value(&mut self, target: *mut SmallValue) {
        let value = SmallValue::from_raw(self.read_int::<u32>());
        *target = value;
        if value.is_pointer() {
            // The writer stored the ID shifted into the offset field.
            let id = value.pointer_offset() >> 3;
            self.apply_or_queue(target as *mut u8, id, RelocationKind::SmallValue);
        }
    }

    /// Reads the entity's ID and binds it to the just-constructed object at
    /// `addr`, mirroring the writer's `end_object`.
    pub fn end_object(&mut self, addr: usize) {
        let id = self.read_int::<u32>();
        self.check_id(id);
        if id == 0 {
            fatal_error("snapshot entity bound to the null relocation id");
        }
        debug_assert!(
            self.object_table[id as usize] == 0 || self.object_table[id as usize] == addr,
            "relocation id bound to two different addresses"
        );
        self.object_table[id as usize] = addr;
    }

    /// Drains the forward-reference queue, applying every pending update.
    ///
    /// Called exactly once, after the full entity stream has been read; by
    /// then every `end_object` has run, so an ID that still has no address
    /// is a corrupted stream or a writer/reader ordering mismatch.
    pub fn flush_relocation_queue(&mut self) {
        let pending = std::mem::take(&mut self.forward_refs);
        for fref in pending {
            if !self.is_resolved(fref.id) {
                fatal_error(&format!(
                    "snapshot relocation id {} never materialized",
                    fref.id
                ));
            }
            let addr = self.resolve(fref.id);
            // SAFETY: the caller of read_relocation/read_tagged_value/
            // read_small_value promised the target stays valid until flush.
            unsafe { self.apply(fref.target, addr, fref.kind) };
        }
    }
}
