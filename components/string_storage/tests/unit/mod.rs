//! Unit test entry point for string_storage.

mod test_storage_append;
