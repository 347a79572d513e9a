//! Stable exit codes for loopsmith CLI commands.

/// Command succeeded, or the loop was stopped by the user.
pub const OK: i32 = 0;
/// Operational failure: missing flow, missing repository, unreadable
/// context file, invalid config, or a failed flow command.
pub const FAILURE: i32 = 1;
