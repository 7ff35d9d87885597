//! Stable exit codes for loom CLI commands.

/// Command succeeded, or the interview/pipeline is complete.
pub const OK: i32 = 0;
/// Command failed (invalid input, failed phase, unreadable state, etc.).
pub const ERROR: i32 = 1;
/// The interview still has unanswered questions.
pub const QUESTIONS_PENDING: i32 = 100;
