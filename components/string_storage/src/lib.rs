//! Packed string storage for compiled bytecode units.
//!
//! Every string literal used by a compiled unit is laid out in one flat byte
//! buffer, addressed by a per-string `(offset, length, encoding)` table. The
//! packer can either lay strings out back to back (fast) or exploit
//! substring containment and suffix/prefix overlap between strings to shrink
//! the buffer (optimizing).
//!
//! # Example
//!
//! ```
//! use string_storage::ConsecutiveStringStorage;
//!
//! let storage = ConsecutiveStringStorage::new(&["splitpea", "peasoup"], true);
//! let mut scratch = String::new();
//! assert_eq!(storage.string_at_index(0, &mut scratch), "splitpea");
//! assert_eq!(storage.string_at_index(1, &mut scratch), "peasoup");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod hash;
mod packer;
pub mod storage;
pub mod string_set;

// Re-export main types at crate root
pub use storage::{ConsecutiveStringStorage, PackStats, StringTableEntry};
pub use string_set::StringSetVector;
