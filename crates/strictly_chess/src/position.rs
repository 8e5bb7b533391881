//! Positions as FEN text.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// FEN of the standard starting position.
pub(crate) const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A board position, stored as a FEN string.
///
/// The arena treats positions as opaque text; only the oracle looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{_0}")]
pub struct Position(String);

impl Position {
    /// Wraps FEN text without validating it.
    pub fn new(fen: impl Into<String>) -> Self {
        Self(fen.into().trim().to_string())
    }

    /// The standard chess starting position.
    pub fn start() -> Self {
        Self::new(START_FEN)
    }

    /// Returns the FEN text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placement, side to move, castling rights and en passant square.
    ///
    /// Two positions with equal keys count as the same position for
    /// repetition purposes.
    pub fn repetition_key(&self) -> String {
        self.0.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
    }

    /// Half-moves since the last capture or pawn move. Missing counters read as zero.
    pub fn halfmove_clock(&self) -> u32 {
        self.field(4).unwrap_or(0)
    }

    /// Full-move number. Missing counters read as one.
    pub fn fullmove_number(&self) -> u32 {
        self.field(5).unwrap_or(1).max(1)
    }

    fn field(&self, index: usize) -> Option<u32> {
        self.0.split_whitespace().nth(index)?.parse().ok()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl From<String> for Position {
    fn from(fen: String) -> Self {
        Self::new(fen)
    }
}

impl From<&str> for Position {
    fn from(fen: &str) -> Self {
        Self::new(fen)
    }
}
