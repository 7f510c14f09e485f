//! Per-kind cell serialization and the whole-heap walk.
//!
//! Each cell kind has a writer and a reader half that must stay mirror
//! images of each other: the reader consumes exactly the fields the writer
//! produced, in order, and both end with the entity's own relocation. The
//! dispatch is an exhaustive match on [`CellKind`], so a new cell kind fails
//! to compile until both halves exist.
//!
//! The packed string storage is persisted as raw side data: its table and
//! buffer are binary-copied, not walked as relocatable objects.

use core_types::{fatal_error, CellKind, SmallValue, TaggedValue};
use memory_manager::{ArrayCell, CellHeader, Heap, MapEntryCell, StringCell};
use string_storage::{ConsecutiveStringStorage, StringTableEntry};

use crate::deserializer::Deserializer;
use crate::relocation::RelocationKind;
use crate::serializer::Serializer;

/// Writes one cell's body.
///
/// # Safety
///
/// `cell` must point at a live, initialized cell of its header's kind.
unsafe fn serialize_cell_body(s: &mut Serializer<'_>, cell: *const CellHeader) {
    match (*cell).kind() {
        CellKind::Uninitialized => {}
        CellKind::DynString => {
            let string = cell as *const StringCell;
            s.write_int::<u32>((*string).length);
            s.write_int::<u8>((*string).is_utf16);
            if (*string).is_utf16() {
                s.write_char16_str((*string).utf16_units());
            } else {
                s.write_char_str((*string).ascii_bytes());
            }
        }
        CellKind::ValueArray => {
            let array = cell as *const ArrayCell;
            s.write_int::<u32>((*array).length);
            for value in (*array).elements() {
                s.write_tagged_value(*value, false);
            }
        }
        CellKind::MapEntry => {
            let entry = cell as *const MapEntryCell;
            s.write_tagged_value((*entry).key, false);
            s.write_small_value((*entry).value);
            s.write_relocation((*entry).next);
        }
    }
}

/// Reads one cell's body, allocating it in the target heap.
/// Returns the new cell's address.
fn deserialize_cell_body(d: &mut Deserializer<'_>, kind: CellKind) -> usize {
    match kind {
        CellKind::Uninitialized => {
            let cell = d.heap_mut().allocate_cell(
                CellKind::Uninitialized,
                std::mem::size_of::<CellHeader>(),
                0,
            );
            cell as usize
        }
        CellKind::DynString => {
            let length = d.read_int::<u32>() as usize;
            let is_utf16 = d.read_int::<u8>() != 0;
            if is_utf16 {
                let units = d.read_char16_str(length);
                StringCell::allocate_utf16(d.heap_mut(), &units) as usize
            } else {
                let bytes = d.read_char_str(length);
                StringCell::allocate_ascii(d.heap_mut(), bytes) as usize
            }
        }
        CellKind::ValueArray => {
            let length = d.read_int::<u32>();
            let array = ArrayCell::allocate(d.heap_mut(), length);
            for i in 0..length {
                // SAFETY: the array was just allocated with `length`
                // elements, and heap cells stay put until the flush.
                unsafe {
                    d.read_tagged_value((*array).element_ptr(i), false);
                }
            }
            array as usize
        }
        CellKind::MapEntry => {
            let entry =
                MapEntryCell::allocate(d.heap_mut(), TaggedValue::empty(), SmallValue::empty());
            // SAFETY: the entry was just allocated, and heap cells stay put
            // until the flush.
            unsafe {
                d.read_tagged_value(&mut (*entry).key, false);
                d.read_small_value(&mut (*entry).value);
                d.read_relocation(
                    &mut (*entry).next as *mut usize as *mut u8,
                    RelocationKind::GcPointer,
                );
            }
            entry as usize
        }
    }
}

/// Writes every cell of `heap` in allocation order: kind tag, body, own
/// relocation.
pub fn serialize_heap(heap: &Heap, s: &mut Serializer<'_>) {
    let cells: Vec<*mut CellHeader> = heap.cells().collect();
    s.write_int::<u32>(cells.len() as u32);
    for cell in cells {
        // SAFETY: the heap iterator yields live cells.
        unsafe {
            s.write_int::<u8>((*cell).kind().as_u8());
            serialize_cell_body(s, cell);
        }
        s.end_object(cell as usize);
    }
}

/// Reads every cell written by [`serialize_heap`], in the same order.
pub fn deserialize_heap(d: &mut Deserializer<'_>) {
    let count = d.read_int::<u32>();
    for _ in 0..count {
        let tag = d.read_int::<u8>();
        let kind = match CellKind::from_u8(tag) {
            Some(kind) => kind,
            None => fatal_error(&format!("snapshot contains unknown cell kind {tag}")),
        };
        let addr = deserialize_cell_body(d, kind);
        d.end_object(addr);
    }
}

/// Binary-copies a storage unit's table and buffer into the stream.
pub fn serialize_string_storage(s: &mut Serializer<'_>, storage: &ConsecutiveStringStorage) {
    s.write_int::<u32>(storage.count() as u32);
    for entry in storage.table() {
        s.write_int::<u32>(entry.offset());
        s.write_int::<u32>(entry.length());
        s.write_int::<u8>(entry.is_utf16() as u8);
    }
    s.write_int::<u32>(storage.storage_size() as u32);
    s.write_data(storage.storage_bytes());
}

/// Reassembles a storage unit written by [`serialize_string_storage`].
pub fn deserialize_string_storage(d: &mut Deserializer<'_>) -> ConsecutiveStringStorage {
    let count = d.read_int::<u32>() as usize;
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = d.read_int::<u32>();
        let length = d.read_int::<u32>();
        let is_utf16 = d.read_int::<u8>() != 0;
        table.push(StringTableEntry::new(offset, length, is_utf16));
    }
    let size = d.read_int::<u32>() as usize;
    let bytes = d.read_data(size).to_vec();
    ConsecutiveStringStorage::from_parts(bytes, table)
}

/// Serializes a complete runtime image: roots, string storage, and every
/// heap cell, in that order.
pub fn save_heap(
    heap: &Heap,
    roots: &[TaggedValue],
    strings: &ConsecutiveStringStorage,
) -> Vec<u8> {
    let mut s = Serializer::new(heap);
    s.write_int::<u32>(roots.len() as u32);
    for root in roots {
        s.write_tagged_value(*root, false);
    }
    serialize_string_storage(&mut s, strings);
    serialize_heap(heap, &mut s);
    s.write_epilogue()
}

/// Restores a runtime image produced by [`save_heap`] into `heap`.
/// Returns the roots and the string storage.
pub fn restore_heap(
    buffer: &[u8],
    heap: &mut Heap,
) -> (Vec<TaggedValue>, ConsecutiveStringStorage) {
    let mut d = Deserializer::new(buffer, heap);
    let root_count = d.read_int::<u32>() as usize;
    let mut roots = vec![TaggedValue::empty(); root_count];
    for root in roots.iter_mut() {
        // SAFETY: the vector is fully allocated and not resized before the
        // flush below.
        unsafe {
            d.read_tagged_value(root, false);
        }
    }
    let strings = deserialize_string_storage(&mut d);
    deserialize_heap(&mut d);
    d.flush_relocation_queue();
    (roots, strings)
}
