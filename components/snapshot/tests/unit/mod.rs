//! Unit test entry point for snapshot.

mod test_snapshot_files;
