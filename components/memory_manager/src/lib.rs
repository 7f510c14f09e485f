//! Heap management for the Aspen runtime.
//!
//! This component provides:
//! - A bump-pointer arena heap owning kind-tagged cells ([`Heap`])
//! - The concrete heap cell layouts ([`cells`])
//! - The GC-barrier-respecting pointer store used when heap links are
//!   written from outside the mutator (for example by the snapshot loader)
//! - The reactivatable scope table used by persistent debugger scopes
//!   ([`scope_table`])
//!
//! Collection itself (marking, sweeping, compaction) lives elsewhere; this
//! crate owns allocation, cell layout and the write primitives other
//! components depend on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cells;
pub mod heap;
pub mod scope_table;

// Re-export main types at crate root
pub use cells::{ArrayCell, CellHeader, MapEntryCell, StringCell};
pub use heap::Heap;
pub use scope_table::{ScopeId, ScopeRef, ScopeState, ScopeTable};
