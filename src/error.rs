// src/error.rs

//! Error types for the preservation engine.
//!
//! One library-wide error enum. Object-level findings (a failed fixity
//! check, an infected scan) are not errors; they are recorded as data.
//! The variants here follow the engine's failure taxonomy: validation
//! failures are rejected before any state change, tool unavailability
//! is local to the object being processed, and concurrency conflicts
//! are no-ops for the losing caller.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input or an illegal state transition. No state was
    /// changed and no event was written.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// An external tool (identifier, scanner, archiver) is missing or
    /// refused to start.
    #[error("external tool unavailable: {0}")]
    ToolUnavailable(String),

    /// A digest did not match its expected value.
    #[error("{algorithm} mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// A run for this schedule is already in flight. The caller's
    /// trigger is a no-op.
    #[error("workflow run already in progress for schedule {0}")]
    ConcurrencyConflict(i64),

    #[error("timed out: {0}")]
    Timeout(String),

    /// A file copy or digest failure during package build. The whole
    /// build is aborted and the partial tree removed.
    #[error("package build failed: {0}")]
    BuildFailure(String),

    #[error("invalid cron expression: {0}")]
    Cron(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a data-integrity finding rather than a
    /// system fault.
    pub fn is_integrity_finding(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { .. })
    }
}
