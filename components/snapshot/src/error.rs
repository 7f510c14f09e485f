//! Snapshot error types.
//!
//! Only header validation has a caller-visible error type: tools probe
//! snapshot files and report which field mismatched before deciding to
//! abort. Everything past a validated header treats the stream as trusted,
//! and violations there go straight to the fatal-error primitive.

use thiserror::Error;

/// A specific header field that failed validation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMismatch {
    /// The stream does not start with the snapshot magic number.
    #[error("snapshot magic mismatch: expected {expected:#010x}, found {found:#010x}")]
    Magic {
        /// The magic this build writes.
        expected: u32,
        /// The magic found in the stream.
        found: u32,
    },

    /// The stream was produced by a different format version.
    #[error("snapshot format version mismatch: expected {expected}, found {found}")]
    Version {
        /// The version this build writes.
        expected: u32,
        /// The version found in the stream.
        found: u32,
    },

    /// The stream's native function table does not match this build's.
    #[error("native function table version mismatch: expected {expected}, found {found}")]
    NativeFunctionTableVersion {
        /// The table version this build writes.
        expected: u32,
        /// The table version found in the stream.
        found: u32,
    },

    /// The stream was produced by a build with different debug assertions.
    #[error("snapshot build mode mismatch: written by debug={written}, running debug={running}")]
    DebugMode {
        /// Whether the writer was a debug build.
        written: bool,
        /// Whether this build is a debug build.
        running: bool,
    },

    /// The stream was produced with different debugger support.
    #[error("snapshot debugger mode mismatch: written with debugger={written}, running with debugger={running}")]
    DebuggerMode {
        /// Whether the writer enabled the debugger.
        written: bool,
        /// Whether this runtime enables the debugger.
        running: bool,
    },

    /// The reader's configured heap is smaller than the writer's.
    #[error("snapshot requires a {required}-byte heap but only {configured} bytes are configured")]
    HeapSize {
        /// The writer's maximum heap size.
        required: u32,
        /// The reader's configured maximum heap size.
        configured: u32,
    },

    /// The stream is shorter than a header.
    #[error("snapshot too short to hold a header")]
    Truncated,
}
