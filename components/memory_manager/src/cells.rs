//! Concrete heap cell layouts.
//!
//! Every cell begins with a [`CellHeader`] carrying its kind tag and total
//! size; variable-length cells place their data directly after the fixed
//! part. All layouts are `#[repr(C)]` because the snapshot subsystem reads
//! and writes individual fields through raw pointers.

use core_types::{CellKind, SmallValue, TaggedValue};

use crate::heap::Heap;

/// Metadata at the start of every heap cell.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CellHeader {
    /// Total cell size in bytes, including the header and any trailing data.
    size: u32,
    /// Concrete type of the cell.
    kind: CellKind,
    /// Marking state for the collector (white = 0).
    mark: u8,
    /// Reserved for future use.
    reserved: u16,
}

impl CellHeader {
    /// Initializes a freshly allocated header.
    ///
    /// # Safety
    ///
    /// `self` must point at writable memory inside the heap.
    pub(crate) unsafe fn init(&mut self, kind: CellKind, size: u32) {
        self.size = size;
        self.kind = kind;
        self.mark = 0;
        self.reserved = 0;
    }

    /// The cell's kind tag.
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Total cell size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// A heap-allocated string primitive. Character data (ASCII bytes or native
/// UTF-16 units) follows the fixed part.
#[repr(C)]
pub struct StringCell {
    /// Cell metadata.
    pub header: CellHeader,
    /// Length in code units.
    pub length: u32,
    /// Nonzero if the data is UTF-16.
    pub is_utf16: u8,
    _pad: [u8; 3],
}

impl StringCell {
    /// Allocates an ASCII string cell and copies `bytes` into it.
    pub fn allocate_ascii(heap: &mut Heap, bytes: &[u8]) -> *mut StringCell {
        debug_assert!(bytes.is_ascii(), "non-ASCII bytes in ASCII string cell");
        let cell = heap.allocate_cell(
            CellKind::DynString,
            std::mem::size_of::<StringCell>(),
            bytes.len(),
        ) as *mut StringCell;
        // SAFETY: allocate_cell returned room for the fixed part plus data.
        unsafe {
            (*cell).length = bytes.len() as u32;
            (*cell).is_utf16 = 0;
            (*cell)._pad = [0; 3];
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), (*cell).data_ptr(), bytes.len());
        }
        cell
    }

    /// Allocates a UTF-16 string cell and copies `units` into it.
    pub fn allocate_utf16(heap: &mut Heap, units: &[u16]) -> *mut StringCell {
        let cell = heap.allocate_cell(
            CellKind::DynString,
            std::mem::size_of::<StringCell>(),
            units.len() * 2,
        ) as *mut StringCell;
        // SAFETY: allocate_cell returned room for the fixed part plus data;
        // the fixed part is 8-aligned so the trailing data is 2-aligned.
        unsafe {
            (*cell).length = units.len() as u32;
            (*cell).is_utf16 = 1;
            (*cell)._pad = [0; 3];
            std::ptr::copy_nonoverlapping(
                units.as_ptr(),
                (*cell).data_ptr() as *mut u16,
                units.len(),
            );
        }
        cell
    }

    /// Whether this cell holds UTF-16 data.
    pub fn is_utf16(&self) -> bool {
        self.is_utf16 != 0
    }

    fn data_ptr(&self) -> *mut u8 {
        // SAFETY: data begins immediately after the fixed part.
        unsafe { (self as *const StringCell as *mut u8).add(std::mem::size_of::<StringCell>()) }
    }

    /// The cell's ASCII bytes.
    ///
    /// # Safety
    ///
    /// The cell must be fully initialized and must not be UTF-16.
    pub unsafe fn ascii_bytes(&self) -> &[u8] {
        debug_assert!(!self.is_utf16());
        std::slice::from_raw_parts(self.data_ptr(), self.length as usize)
    }

    /// The cell's UTF-16 units.
    ///
    /// # Safety
    ///
    /// The cell must be fully initialized and must be UTF-16.
    pub unsafe fn utf16_units(&self) -> &[u16] {
        debug_assert!(self.is_utf16());
        std::slice::from_raw_parts(self.data_ptr() as *const u16, self.length as usize)
    }
}

/// A fixed-length array of tagged values. Elements follow the fixed part.
#[repr(C)]
pub struct ArrayCell {
    /// Cell metadata.
    pub header: CellHeader,
    /// Number of elements.
    pub length: u32,
    _pad: u32,
}

impl ArrayCell {
    /// Allocates an array cell with `length` elements, all empty.
    pub fn allocate(heap: &mut Heap, length: u32) -> *mut ArrayCell {
        let cell = heap.allocate_cell(
            CellKind::ValueArray,
            std::mem::size_of::<ArrayCell>(),
            length as usize * std::mem::size_of::<TaggedValue>(),
        ) as *mut ArrayCell;
        // SAFETY: allocate_cell returned room for the elements; the fixed
        // part is 8-aligned so the elements are 8-aligned.
        unsafe {
            (*cell).length = length;
            (*cell)._pad = 0;
            for i in 0..length {
                *(*cell).element_ptr(i) = TaggedValue::empty();
            }
        }
        cell
    }

    /// Pointer to element `index`.
    ///
    /// # Safety
    ///
    /// `index` must be less than `length`.
    pub unsafe fn element_ptr(&self, index: u32) -> *mut TaggedValue {
        debug_assert!(index < self.length);
        let first = (self as *const ArrayCell as *mut u8).add(std::mem::size_of::<ArrayCell>())
            as *mut TaggedValue;
        first.add(index as usize)
    }

    /// The elements as a slice.
    ///
    /// # Safety
    ///
    /// The cell must be fully initialized.
    pub unsafe fn elements(&self) -> &[TaggedValue] {
        let first = (self as *const ArrayCell as *const u8)
            .add(std::mem::size_of::<ArrayCell>()) as *const TaggedValue;
        std::slice::from_raw_parts(first, self.length as usize)
    }
}

/// A hash-map bucket entry: a key/value pair chained to the next entry in
/// its bucket.
#[repr(C)]
pub struct MapEntryCell {
    /// Cell metadata.
    pub header: CellHeader,
    /// The entry's key.
    pub key: TaggedValue,
    /// The entry's value, in compressed form.
    pub value: SmallValue,
    _pad: u32,
    /// Address of the next entry in the bucket chain, or 0.
    pub next: usize,
}

impl MapEntryCell {
    /// Allocates a map entry with no successor.
    pub fn allocate(heap: &mut Heap, key: TaggedValue, value: SmallValue) -> *mut MapEntryCell {
        let cell = heap.allocate_cell(
            CellKind::MapEntry,
            std::mem::size_of::<MapEntryCell>(),
            0,
        ) as *mut MapEntryCell;
        // SAFETY: allocate_cell returned room for the fixed part.
        unsafe {
            (*cell).key = key;
            (*cell).value = value;
            (*cell)._pad = 0;
            (*cell).next = 0;
        }
        cell
    }

    /// Links `cell` to `next` through the write barrier.
    ///
    /// # Safety
    ///
    /// `cell` must be a live map entry in `heap`; `next` must be 0 or the
    /// address of a live map entry in `heap`.
    pub unsafe fn set_next(cell: *mut MapEntryCell, heap: &mut Heap, next: usize) {
        heap.barriered_store(&mut (*cell).next, next);
    }
}
