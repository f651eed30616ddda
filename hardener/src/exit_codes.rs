//! Stable exit codes for hardener CLI commands.

/// Every step of the run succeeded (or was planned, in a dry run).
pub const OK: i32 = 0;
/// A mutation failed and the run was aborted. Earlier changes stay applied.
pub const FAILED: i32 = 1;
/// Arguments or configuration were rejected before anything ran.
pub const INVALID: i32 = 2;
