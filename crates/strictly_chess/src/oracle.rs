//! The legality oracle boundary.

use crate::{MoveInput, Position};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Game-ending condition reported by the oracle after an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TerminalKind {
    /// The side to move is mated; the mover wins.
    Checkmate,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can possibly mate.
    InsufficientMaterial,
    /// The same position has occurred three times.
    Repetition,
    /// One hundred half-moves without a capture or pawn move.
    FiftyMove,
}

impl TerminalKind {
    /// Whether this ending has a winner.
    pub fn is_decisive(self) -> bool {
        matches!(self, Self::Checkmate)
    }
}

/// A move the oracle accepted.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct AcceptedMove {
    /// Canonical coordinate notation of the move actually played.
    notation: String,
    /// Position after the move.
    position: Position,
    /// Set when the move ended the game.
    terminal: Option<TerminalKind>,
}

impl AcceptedMove {
    /// Creates an accepted move.
    pub fn new(notation: String, position: Position, terminal: Option<TerminalKind>) -> Self {
        Self {
            notation,
            position,
            terminal,
        }
    }
}

/// The oracle's answer to a candidate move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The move is legal.
    Accepted(AcceptedMove),
    /// The move is illegal or unparseable.
    Rejected {
        /// Human-readable explanation.
        reason: String,
    },
}

/// Adjudicates moves. Implementations must be pure: the same inputs always
/// produce the same verdict.
pub trait MoveOracle {
    /// Position a new session starts from.
    fn initial_position(&self) -> Position;

    /// Applies `input` to the last entry of `line`.
    ///
    /// `line` is every position of the game so far, oldest first, so that
    /// repetition can be detected. It is never empty.
    fn apply_move(&self, line: &[Position], input: &MoveInput) -> Verdict;
}
