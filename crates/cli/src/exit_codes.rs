//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad args, bad boundaries, no template)       |
//! | 3    | Job failed (unreadable file, missing template sheet)      |
//! | 4    | Invalid or unknown profile                                |
//! | 5    | Partial run under `--strict`                              |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, week boundaries or month name.
pub const EXIT_USAGE: u8 = 2;

/// The job aborted: an input or template could not be read, a required
/// template sheet is missing, or the report could not be written.
pub const EXIT_JOB_FAILED: u8 = 3;

/// Profile TOML failed to parse or validate, or names no built-in.
pub const EXIT_INVALID_PROFILE: u8 = 4;

/// Report written, but invoices went unmatched or sheets were skipped
/// and `--strict` was given.
pub const EXIT_PARTIAL: u8 = 5;
