//! Stable exit codes for dataentry CLI commands.

/// Command succeeded (per-row failures are recorded in the outcome log, not here).
pub const OK: i32 = 0;
/// Invalid mapping, filter, run parameters, or unreadable input/log files.
pub const INVALID: i32 = 1;
/// The browser automation session could not be started.
pub const BROWSER_LAUNCH: i32 = 2;
/// The automation session was lost mid-run; remaining rows were not attempted.
pub const SESSION_LOST: i32 = 3;
/// `dataentry check` found at least one row that fails validation.
pub const ROWS_REJECTED: i32 = 4;
