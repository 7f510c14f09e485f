//! How a resolved address is written back into a field.

/// Distinguishes the four field representations a relocation can target.
///
/// The writer records pointers uniformly as IDs; it is the reader that needs
/// to know how the resolved address must be stored: a plain pointer store, a
/// GC-barrier-respecting store, or a payload update inside one of the two
/// boxed value representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    /// A raw pointer field in a native structure; plain store.
    NativePointer,
    /// A pointer field inside a heap cell; stored through the write barrier.
    GcPointer,
    /// A 64-bit tagged value whose payload encodes the pointer.
    TaggedValue,
    /// A 32-bit compressed value whose payload encodes the pointer.
    SmallValue,
}
