//! Strictly Chess - the legality oracle behind strictly_arena sessions.
//!
//! The arena engine never interprets moves itself. It hands the current
//! position and the raw move text to a [`MoveOracle`] and records whatever
//! [`Verdict`] comes back.
//!
//! # Example
//!
//! ```
//! use strictly_chess::{ChessOracle, MoveInput, MoveOracle, Verdict};
//!
//! let oracle = ChessOracle::new();
//! let start = oracle.initial_position();
//! let input = MoveInput::parse("e2e4").expect("non-empty input");
//!
//! match oracle.apply_move(&[start], &input) {
//!     Verdict::Accepted(accepted) => assert_eq!(accepted.notation(), "e2e4"),
//!     Verdict::Rejected { reason } => panic!("{reason}"),
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod input;
mod oracle;
mod position;
mod render;
mod side;
mod standard;

pub use input::{MoveInput, MoveInputError};
pub use oracle::{AcceptedMove, MoveOracle, TerminalKind, Verdict};
pub use position::Position;
pub use render::render_board;
pub use side::Side;
pub use standard::ChessOracle;
