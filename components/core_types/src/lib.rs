//! Core value types shared across the Aspen JavaScript runtime.
//!
//! This crate provides the foundational types consumed by the heap, the
//! string-table machinery and the snapshot subsystem:
//!
//! - NaN-boxed 64-bit tagged values ([`TaggedValue`]) and their compressed
//!   32-bit form ([`SmallValue`])
//! - The closed set of heap cell kinds ([`CellKind`])
//! - Runtime construction parameters ([`RuntimeConfig`])
//! - The fatal-error primitive used for unrecoverable conditions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell_kind;
pub mod config;
pub mod error;
pub mod value;

// Re-export main types at crate root
pub use cell_kind::CellKind;
pub use config::RuntimeConfig;
pub use error::fatal_error;
pub use value::{SmallValue, TaggedValue};
