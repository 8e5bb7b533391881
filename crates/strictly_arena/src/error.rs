//! Error types for arena operations.

use derive_more::{Display, Error};
use strum::Display as StrumDisplay;
use tracing::instrument;

/// Category of an [`ArenaError`]; callers branch on this, not on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed or empty input. Nothing was changed.
    Validation,
    /// The request conflicts with current session state. Nothing was changed.
    Conflict,
    /// The move was rejected and the attempt was recorded on the session.
    IllegalMove,
    /// Unknown session or ticket.
    NotFound,
    /// A lock could not be acquired in time.
    Timeout,
    /// The record store could not be read or written.
    Storage,
}

/// Arena error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("{} error: {} at {}:{}", kind, message, file, line)]
pub struct ArenaError {
    /// What went wrong, broadly.
    pub kind: ErrorKind,
    /// Human-readable reason naming the rule that was violated.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ArenaError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Malformed input.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Request conflicts with session state.
    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Rejected move that was recorded.
    #[track_caller]
    pub fn illegal_move(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalMove, message)
    }

    /// Unknown record.
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Lock wait exhausted.
    #[track_caller]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Store failure.
    #[track_caller]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }
}

impl From<std::io::Error> for ArenaError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for ArenaError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::storage(format!("Malformed record: {}", err))
    }
}
