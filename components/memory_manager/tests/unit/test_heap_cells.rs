//! Heap and cell behavior through the public API.

use core_types::{CellKind, RuntimeConfig, SmallValue, TaggedValue};
use memory_manager::{ArrayCell, Heap, MapEntryCell, StringCell};

fn heap() -> Heap {
    Heap::new(RuntimeConfig {
        max_heap_size: 256 * 1024,
        enable_debugger: false,
    })
}

#[test]
fn test_mixed_allocation_walk() {
    let mut heap = heap();
    StringCell::allocate_ascii(&mut heap, b"walkable");
    ArrayCell::allocate(&mut heap, 3);
    MapEntryCell::allocate(
        &mut heap,
        TaggedValue::undefined(),
        SmallValue::encode_int(0),
    );

    let kinds: Vec<CellKind> = heap
        .cells()
        // SAFETY: the iterator yields headers of live cells.
        .map(|c| unsafe { (*c).kind() })
        .collect();
    assert_eq!(
        kinds,
        [CellKind::DynString, CellKind::ValueArray, CellKind::MapEntry]
    );
}

#[test]
fn test_compressed_pointers_fit_small_values() {
    let mut heap = heap();
    let cell = ArrayCell::allocate(&mut heap, 1) as usize;
    let compressed = heap.compress(cell);
    let value = SmallValue::encode_pointer_offset(compressed);
    assert!(value.is_pointer());
    assert_eq!(heap.decompress(value.pointer_offset()), cell);
}

#[test]
fn test_array_holds_pointers_to_other_cells() {
    let mut heap = heap();
    let s = StringCell::allocate_ascii(&mut heap, b"elem");
    let arr = ArrayCell::allocate(&mut heap, 2);
    // SAFETY: both cells were just allocated.
    unsafe {
        *(*arr).element_ptr(0) = TaggedValue::encode_str_ptr(s as usize);
        *(*arr).element_ptr(1) = TaggedValue::encode_double(2.5);
        let elems = (*arr).elements();
        assert_eq!(elems[0].pointer(), s as usize);
        assert_eq!((*(elems[0].pointer() as *const StringCell)).ascii_bytes(), b"elem");
    }
}
