//! Error taxonomy shared across the store, schedulers, and generator.
//!
//! Store errors are classified once, at the rusqlite boundary: unique
//! constraint hits become [`StudyError::Conflict`], other constraint
//! violations become [`StudyError::Integrity`], everything else is
//! [`StudyError::Backend`]. Argument validation never reaches the database
//! and raises [`StudyError::Invalid`] directly.

use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StudyError>;

#[derive(Debug, Error)]
pub enum StudyError {
    /// A referenced item or review does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation (duplicate kanji, duplicate review).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Argument outside its contract; rejected before any I/O.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Referential or check constraint broken. Treated as a bug.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Any lower-level persistence failure; the transaction was rolled back.
    #[error("database error: {0}")]
    Backend(String),

    /// The MCQ generator could not assemble four unique options.
    #[error("question unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StudyError {
    fn from(err: std::io::Error) -> Self {
        StudyError::Backend(err.to_string())
    }
}

impl From<rusqlite::Error> for StudyError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(cause, _)
                if cause.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                match cause.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        StudyError::Conflict(err.to_string())
                    }
                    _ => StudyError::Integrity(err.to_string()),
                }
            }
            _ => StudyError::Backend(err.to_string()),
        }
    }
}
