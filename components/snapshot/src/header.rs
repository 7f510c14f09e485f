//! The snapshot compatibility header.
//!
//! A fixed-layout record written before anything else in the stream. It
//! gates loading entirely: if any field other than the heap size differs
//! between writer and reader, the rest of the byte layout cannot be trusted
//! to mean what the reader thinks it means, so validation failure is
//! terminal. The heap size is the one ordered field: the reader's
//! configured heap must be at least as large as the writer's.

use core_types::RuntimeConfig;

use crate::error::HeaderMismatch;
use crate::primitives::StreamInt;

/// "SNAP" as a little-endian u32.
pub const SNAPSHOT_MAGIC: u32 = 0x5041_4E53;

/// Bumped whenever the stream layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Version of the native function table entities may reference.
pub const NATIVE_FUNCTION_TABLE_VERSION: u32 = 1;

/// Serialized size of the header: four u32 fields and two flag bytes.
pub const HEADER_BYTE_SIZE: usize = 18;

/// The fixed compatibility record at the start of every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeHeader {
    /// Must equal [`SNAPSHOT_MAGIC`].
    pub magic: u32,
    /// Must equal [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Must equal [`NATIVE_FUNCTION_TABLE_VERSION`].
    pub native_function_table_version: u32,
    /// The writer's maximum heap size in bytes.
    pub max_heap_size: u32,
    /// Whether the writer was built with debug assertions.
    pub is_debug: bool,
    /// Whether the writer's runtime enabled debugger support.
    pub is_enable_debugger: bool,
}

impl SerializeHeader {
    /// Builds the header this runtime writes.
    pub fn for_runtime(config: &RuntimeConfig) -> Self {
        SerializeHeader {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            native_function_table_version: NATIVE_FUNCTION_TABLE_VERSION,
            max_heap_size: config.max_heap_size,
            is_debug: cfg!(debug_assertions),
            is_enable_debugger: config.enable_debugger,
        }
    }

    /// Appends the fixed-layout encoding to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        self.magic.write_to(out);
        self.version.write_to(out);
        self.native_function_table_version.write_to(out);
        self.max_heap_size.write_to(out);
        (self.is_debug as u8).write_to(out);
        (self.is_enable_debugger as u8).write_to(out);
    }

    /// Decodes a header from the front of `bytes`, if there is room.
    pub fn read(bytes: &[u8]) -> Option<SerializeHeader> {
        if bytes.len() < HEADER_BYTE_SIZE {
            return None;
        }
        Some(SerializeHeader {
            magic: u32::read_from(&bytes[0..]),
            version: u32::read_from(&bytes[4..]),
            native_function_table_version: u32::read_from(&bytes[8..]),
            max_heap_size: u32::read_from(&bytes[12..]),
            is_debug: bytes[16] != 0,
            is_enable_debugger: bytes[17] != 0,
        })
    }

    /// Checks this header against the running build and `config`.
    ///
    /// Checks run in a fixed order (magic, version, native function table,
    /// build mode, heap size) and the first mismatch is returned. The
    /// loading path treats any mismatch as fatal; this standalone form
    /// exists so tools can report the offending field.
    pub fn validate(&self, config: &RuntimeConfig) -> Result<(), HeaderMismatch> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(HeaderMismatch::Magic {
                expected: SNAPSHOT_MAGIC,
                found: self.magic,
            });
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(HeaderMismatch::Version {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        if self.native_function_table_version != NATIVE_FUNCTION_TABLE_VERSION {
            return Err(HeaderMismatch::NativeFunctionTableVersion {
                expected: NATIVE_FUNCTION_TABLE_VERSION,
                found: self.native_function_table_version,
            });
        }
        if self.is_debug != cfg!(debug_assertions) {
            return Err(HeaderMismatch::DebugMode {
                written: self.is_debug,
                running: cfg!(debug_assertions),
            });
        }
        if self.is_enable_debugger != config.enable_debugger {
            return Err(HeaderMismatch::DebuggerMode {
                written: self.is_enable_debugger,
                running: config.enable_debugger,
            });
        }
        if self.max_heap_size > config.max_heap_size {
            return Err(HeaderMismatch::HeapSize {
                required: self.max_heap_size,
                configured: config.max_heap_size,
            });
        }
        Ok(())
    }
}
