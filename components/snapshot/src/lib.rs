//! Heap snapshot serialization for the Aspen runtime.
//!
//! A snapshot persists a live heap (every cell, every pointer between
//! cells, and the packed string storage) as one relocatable byte stream,
//! and reconstructs it exactly. Pointers are replaced in the stream by dense
//! relocation IDs assigned in first-seen order; the reader mirrors the
//! writer's ID space and resolves forward references once the whole entity
//! stream has been read.
//!
//! The writer and reader must walk entities in the same order, share the
//! build configuration recorded in the [`SerializeHeader`], and share host
//! endianness. A stream that fails any of those checks is rejected before a
//! single entity is read; failures after that point are unrecoverable by
//! design.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod cells;
pub mod deserializer;
pub mod error;
pub mod header;
pub mod primitives;
pub mod relocation;
pub mod serializer;

// Re-export main types at crate root
pub use buffer::MemoryBuffer;
pub use cells::{restore_heap, save_heap};
pub use deserializer::Deserializer;
pub use error::HeaderMismatch;
pub use header::SerializeHeader;
pub use relocation::RelocationKind;
pub use serializer::Serializer;
