//! Unit test entry point for core_types.
