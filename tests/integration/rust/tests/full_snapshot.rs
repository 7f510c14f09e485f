//! End-to-end snapshot tests: pack strings, build a heap, persist, restore.

use core_types::{RuntimeConfig, SmallValue, TaggedValue};
use memory_manager::{ArrayCell, Heap, MapEntryCell, StringCell};
use snapshot::{restore_heap, save_heap};
use string_storage::{ConsecutiveStringStorage, StringSetVector};

fn heap() -> Heap {
    Heap::new(RuntimeConfig::default())
}

/// A compiled-unit-shaped workload: interned literals in packed storage,
/// heap cells holding strings, arrays and map chains, roots into all of it.
#[test]
fn test_full_runtime_image_roundtrip() {
    // Compile-time side: intern literals and pack them.
    let mut literals = StringSetVector::new();
    for s in ["print", "console", "print", "日本語", "console"] {
        literals.insert(s);
    }
    let storage = ConsecutiveStringStorage::new(literals.as_slice(), true);

    // Runtime side: a small object graph.
    let mut writer_heap = heap();
    let name = StringCell::allocate_ascii(&mut writer_heap, b"globalThis");
    let values = ArrayCell::allocate(&mut writer_heap, 3);
    let entry = MapEntryCell::allocate(
        &mut writer_heap,
        TaggedValue::encode_str_ptr(name as usize),
        SmallValue::encode_int(42),
    );
    // SAFETY: all cells were just allocated in writer_heap.
    unsafe {
        *(*values).element_ptr(0) = TaggedValue::encode_double(1.25);
        *(*values).element_ptr(1) = TaggedValue::encode_obj_ptr(entry as usize);
        *(*values).element_ptr(2) = TaggedValue::undefined();
        MapEntryCell::set_next(entry, &mut writer_heap, entry as usize); // self-loop
    }

    let roots = [
        TaggedValue::encode_obj_ptr(values as usize),
        TaggedValue::encode_str_ptr(name as usize),
        TaggedValue::bool_value(true),
    ];
    let bytes = save_heap(&writer_heap, &roots, &storage);

    // Restore into a fresh runtime.
    let mut reader_heap = heap();
    let (new_roots, new_storage) = restore_heap(&bytes, &mut reader_heap);

    let mut scratch = String::new();
    assert_eq!(new_storage.count(), 3);
    assert_eq!(new_storage.string_at_index(0, &mut scratch), "print");
    assert_eq!(new_storage.string_at_index(2, &mut scratch), "日本語");

    assert_eq!(new_roots.len(), 3);
    assert!(new_roots[2].as_bool());
    let new_values = new_roots[0].pointer() as *const ArrayCell;
    // SAFETY: restore_heap materialized every cell.
    unsafe {
        let elements = (*new_values).elements();
        assert_eq!(elements[0].as_double(), 1.25);
        assert!(elements[2].is_undefined());

        let new_entry = elements[1].pointer() as *const MapEntryCell;
        assert_eq!((*new_entry).value.as_int(), 42);
        // Self-loop survived.
        assert_eq!((*new_entry).next, new_entry as usize);
        // Both root and map key point at the same string cell.
        let new_name = (*new_entry).key.pointer() as *const StringCell;
        assert_eq!(new_roots[1].pointer(), new_name as usize);
        assert_eq!((*new_name).ascii_bytes(), b"globalThis");
    }
}

/// Two image generations: a base unit and a delta unit appended to it, both
/// surviving a snapshot.
#[test]
fn test_delta_compiled_strings_snapshot() {
    let base = ConsecutiveStringStorage::new(&["require", "module"], true);
    let delta = ConsecutiveStringStorage::new(&["exports", ""], false);
    let mut combined = base;
    combined.append(delta);

    let writer_heap = heap();
    let bytes = save_heap(&writer_heap, &[], &combined);

    let mut reader_heap = heap();
    let (_, restored) = restore_heap(&bytes, &mut reader_heap);
    let mut scratch = String::new();
    assert_eq!(restored.count(), 4);
    assert_eq!(restored.string_at_index(0, &mut scratch), "require");
    assert_eq!(restored.string_at_index(1, &mut scratch), "module");
    assert_eq!(restored.string_at_index(2, &mut scratch), "exports");
    assert_eq!(restored.string_at_index(3, &mut scratch), "");
    // Entry hashes keep working against the restored bytes.
    assert_eq!(
        restored.entry_hash(0),
        string_storage::hash::hash_ascii(b"require")
    );
}

/// Repeated save/restore is a fixed point: a second generation image equals
/// the first in observable content.
#[test]
fn test_second_generation_snapshot_matches() {
    let mut first_heap = heap();
    let cell = StringCell::allocate_ascii(&mut first_heap, b"stable");
    let roots = [TaggedValue::encode_str_ptr(cell as usize)];
    let storage = ConsecutiveStringStorage::new(&["one", "two"], true);
    let image1 = save_heap(&first_heap, &roots, &storage);

    let mut second_heap = heap();
    let (roots2, storage2) = restore_heap(&image1, &mut second_heap);
    let image2 = save_heap(&second_heap, &roots2, &storage2);

    let mut third_heap = heap();
    let (roots3, storage3) = restore_heap(&image2, &mut third_heap);
    let new_cell = roots3[0].pointer() as *const StringCell;
    // SAFETY: restore_heap materialized the cell.
    unsafe {
        assert_eq!((*new_cell).ascii_bytes(), b"stable");
    }
    let mut scratch = String::new();
    assert_eq!(storage3.string_at_index(1, &mut scratch), "two");
}
