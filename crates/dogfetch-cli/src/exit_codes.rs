//! Process exit codes.
//!
//! Fetch failures exit with `FetchError::exit_code()`:
//! 1 for a 4xx response, 5 for network and other server trouble,
//! 6 for payloads that do not decode.

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 2; // Bad flags, env or base URL
pub const IMAGE_UNAVAILABLE: i32 = 3; // Best-effort image load came back empty
pub const WRITE_FAILED: i32 = 4; // Output file could not be written
pub const INTERRUPTED: i32 = 130; // Ctrl-C
