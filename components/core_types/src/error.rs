//! The fatal-error primitive for unrecoverable engine conditions.
//!
//! A corrupted snapshot stream, an incompatible snapshot header, or a
//! relocation that cannot be resolved all mean the engine's view of memory
//! can no longer be trusted. There is no unwinding or cleanup to run in that
//! situation; the process must stop. All such conditions funnel through
//! [`fatal_error`].

/// Prints a diagnostic and terminates.
///
/// Release builds are compiled with `panic = "abort"`, so this never unwinds
/// in production. Debug and test builds panic with the same message, which
/// lets tests observe the fatal path with `#[should_panic]`.
pub fn fatal_error(msg: &str) -> ! {
    eprintln!("aspen fatal error: {msg}");
    panic!("aspen fatal error: {msg}");
}
