//! The closed set of heap cell kinds.
//!
//! Every heap-allocated entity carries a one-byte kind tag in its header.
//! The snapshot subsystem dispatches per-kind serialization through an
//! exhaustive `match` on this enum, so adding a cell type is a compile-time
//! change that the compiler checks at every dispatch site.

/// Identifies the concrete type of a heap-allocated cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// An allocated but not yet initialized cell.
    Uninitialized = 0,
    /// A heap-allocated string primitive (ASCII or UTF-16).
    DynString = 1,
    /// A fixed-length array of tagged values.
    ValueArray = 2,
    /// A hash-map bucket entry: key, value and a chain link.
    MapEntry = 3,
}

impl CellKind {
    /// Reconstructs a kind from its tag byte, if valid.
    pub fn from_u8(tag: u8) -> Option<CellKind> {
        match tag {
            0 => Some(CellKind::Uninitialized),
            1 => Some(CellKind::DynString),
            2 => Some(CellKind::ValueArray),
            3 => Some(CellKind::MapEntry),
            _ => None,
        }
    }

    /// Returns the tag byte for this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
