//! Integration tests across the snapshot, heap and string-storage
//! components. See the `tests/` directory.
