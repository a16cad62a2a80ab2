//! Core error types.

use thiserror::Error;

/// Errors raised by the GradeDB engine.
///
/// The three business-rule violations are distinct variants so callers can
/// branch on kind; they are expected, local failures and are never retried.
/// Storage and codec failures pass through unchanged rather than being
/// reinterpreted as business errors. An empty query result is not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// No student with the given id.
    #[error("student {id} not found")]
    NotFound { id: i64 },

    /// A student with the given id already exists.
    #[error("student {id} already exists")]
    AlreadyExists { id: i64 },

    /// The mark is structurally equal to one already recorded for the
    /// student.
    #[error("duplicate mark for student {id}")]
    DuplicateMark { id: i64 },

    /// Month outside `1..=12` in a month/year query.
    #[error("invalid month {month}")]
    InvalidMonth { month: u32 },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Document encode/decode error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
