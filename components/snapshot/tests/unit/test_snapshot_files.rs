//! Snapshots written to and mapped back from real files.

use std::io::Write;

use core_types::{RuntimeConfig, TaggedValue};
use memory_manager::{ArrayCell, Heap, StringCell};
use snapshot::{restore_heap, save_heap, MemoryBuffer};
use string_storage::ConsecutiveStringStorage;

fn heap() -> Heap {
    Heap::new(RuntimeConfig::default())
}

#[test]
fn test_snapshot_survives_a_file_mapping() {
    let mut writer_heap = heap();
    let s = StringCell::allocate_ascii(&mut writer_heap, b"mapped");
    let arr = ArrayCell::allocate(&mut writer_heap, 1);
    // SAFETY: both cells were just allocated.
    unsafe {
        *(*arr).element_ptr(0) = TaggedValue::encode_str_ptr(s as usize);
    }
    let root = TaggedValue::encode_obj_ptr(arr as usize);
    let storage = ConsecutiveStringStorage::new(&["persisted"], false);
    let bytes = save_heap(&writer_heap, &[root], &storage);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let buffer = MemoryBuffer::from_file(file.path()).unwrap();
    let mut reader_heap = heap();
    let (roots, restored_storage) = restore_heap(buffer.as_bytes(), &mut reader_heap);

    let new_arr = roots[0].pointer() as *const ArrayCell;
    // SAFETY: restore_heap materialized the cells.
    unsafe {
        let new_str = (*new_arr).elements()[0].pointer() as *const StringCell;
        assert_eq!((*new_str).ascii_bytes(), b"mapped");
    }
    let mut scratch = String::new();
    assert_eq!(restored_storage.string_at_index(0, &mut scratch), "persisted");
}

#[test]
fn test_empty_snapshot_roundtrips() {
    let writer_heap = heap();
    let bytes = save_heap(&writer_heap, &[], &ConsecutiveStringStorage::default());
    let mut reader_heap = heap();
    let (roots, storage) = restore_heap(&bytes, &mut reader_heap);
    assert!(roots.is_empty());
    assert_eq!(storage.count(), 0);
    assert_eq!(reader_heap.cells().count(), 0);
}

#[test]
fn test_snapshot_restores_into_larger_heap() {
    let mut writer_heap = Heap::new(RuntimeConfig {
        max_heap_size: 64 * 1024,
        enable_debugger: false,
    });
    ArrayCell::allocate(&mut writer_heap, 4);
    let bytes = save_heap(&writer_heap, &[], &ConsecutiveStringStorage::default());

    let mut reader_heap = Heap::new(RuntimeConfig {
        max_heap_size: 128 * 1024,
        enable_debugger: false,
    });
    restore_heap(&bytes, &mut reader_heap);
    assert_eq!(reader_heap.cells().count(), 1);
}
