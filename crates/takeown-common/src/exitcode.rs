//! Process exit codes returned to the shell, matching the upstream `takeown` tool.
//!
//! The core never calls `std::process::exit`; it returns typed errors that
//! the CLI layer folds into one of these codes (or their bitwise-OR across
//! several command-line arguments).

/// Everything requested succeeded.
pub const SUCCESS: i32 = 0;
/// An I/O failure, a corrupt table, or any other operational error.
pub const OPERATION_ERROR: i32 = 32;
/// Bad command-line usage.
pub const USAGE: i32 = 64;
/// The caller was not authorized to perform the requested operation.
pub const PERMISSION_DENIED: i32 = 128;
