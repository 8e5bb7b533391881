//! Standard chess rules, backed by the `chess` crate.

use crate::position::START_FEN;
use crate::{AcceptedMove, MoveInput, MoveOracle, Position, TerminalKind, Verdict};
use chess::{BitBoard, Board, BoardStatus, ChessMove, Color, Piece, Square};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Half-moves without progress after which the game is drawn.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Occurrences of one position that end the game.
const REPETITION_LIMIT: usize = 3;

/// The standard chess legality oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessOracle;

impl ChessOracle {
    /// Creates the oracle.
    pub fn new() -> Self {
        Self
    }

    fn parse_board(position: &Position) -> Result<Board, String> {
        Board::from_str(position.as_str())
            .map_err(|e| format!("Stored position '{}' is not valid FEN: {}", position, e))
    }

    fn parse_move(board: &Board, input: &MoveInput) -> Result<ChessMove, String> {
        match input {
            MoveInput::Coordinate(text) => {
                let from = Square::from_str(&text[0..2])
                    .map_err(|_| format!("'{}' is not a square", &text[0..2]))?;
                let to = Square::from_str(&text[2..4])
                    .map_err(|_| format!("'{}' is not a square", &text[2..4]))?;
                let promotion = text[4..].chars().next().and_then(promotion_piece);
                Ok(ChessMove::new(from, to, promotion))
            }
            MoveInput::Text(text) => ChessMove::from_san(board, text)
                .map_err(|_| format!("'{}' is not a legal move in this position", text)),
        }
    }

    /// Writes the FEN for `board`, carrying the move counters forward.
    fn next_position(before: &Position, board: &Board, resets_clock: bool, mover: Color) -> Position {
        let fen = board.to_string();
        let head = fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ");

        let halfmove = if resets_clock {
            0
        } else {
            before.halfmove_clock() + 1
        };
        let fullmove = match mover {
            Color::White => before.fullmove_number(),
            Color::Black => before.fullmove_number() + 1,
        };

        Position::new(format!("{} {} {}", head, halfmove, fullmove))
    }

    fn terminal(after: &Board, position: &Position, line: &[Position]) -> Option<TerminalKind> {
        match after.status() {
            BoardStatus::Checkmate => return Some(TerminalKind::Checkmate),
            BoardStatus::Stalemate => return Some(TerminalKind::Stalemate),
            BoardStatus::Ongoing => {}
        }

        if insufficient_material(after) {
            return Some(TerminalKind::InsufficientMaterial);
        }

        let key = position.repetition_key();
        let seen = line.iter().filter(|p| p.repetition_key() == key).count();
        if seen + 1 >= REPETITION_LIMIT {
            return Some(TerminalKind::Repetition);
        }

        if position.halfmove_clock() >= FIFTY_MOVE_PLIES {
            return Some(TerminalKind::FiftyMove);
        }

        None
    }
}

impl MoveOracle for ChessOracle {
    fn initial_position(&self) -> Position {
        // Round-trip through the board so every stored position shares one FEN dialect.
        let start = Position::new(START_FEN);
        match Self::parse_board(&start) {
            Ok(board) => {
                let head = board.to_string().split_whitespace().take(4).collect::<Vec<_>>().join(" ");
                Position::new(format!("{} 0 1", head))
            }
            Err(_) => start,
        }
    }

    #[instrument(skip(self, line), fields(plies = line.len()))]
    fn apply_move(&self, line: &[Position], input: &MoveInput) -> Verdict {
        let Some(before) = line.last() else {
            return Verdict::Rejected {
                reason: "No position to move from".to_string(),
            };
        };

        let board = match Self::parse_board(before) {
            Ok(board) => board,
            Err(reason) => return Verdict::Rejected { reason },
        };

        let chess_move = match Self::parse_move(&board, input) {
            Ok(m) => m,
            Err(reason) => {
                debug!(%input, %reason, "Move did not parse");
                return Verdict::Rejected { reason };
            }
        };

        if !board.legal(chess_move) {
            debug!(%input, "Move is not legal");
            return Verdict::Rejected {
                reason: format!("'{}' is not a legal move in this position", input),
            };
        }

        let resets_clock = board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            || board.piece_on(chess_move.get_dest()).is_some();
        let after = board.make_move_new(chess_move);
        let position = Self::next_position(before, &after, resets_clock, board.side_to_move());
        let terminal = Self::terminal(&after, &position, line);

        Verdict::Accepted(AcceptedMove::new(notation(chess_move), position, terminal))
    }
}

fn promotion_piece(letter: char) -> Option<Piece> {
    match letter {
        'q' => Some(Piece::Queen),
        'r' => Some(Piece::Rook),
        'b' => Some(Piece::Bishop),
        'n' => Some(Piece::Knight),
        _ => None,
    }
}

fn notation(chess_move: ChessMove) -> String {
    let promotion = match chess_move.get_promotion() {
        Some(Piece::Queen) => "q",
        Some(Piece::Rook) => "r",
        Some(Piece::Bishop) => "b",
        Some(Piece::Knight) => "n",
        _ => "",
    };
    format!("{}{}{}", chess_move.get_source(), chess_move.get_dest(), promotion)
}

/// Bare kings, a single minor piece, or bishops that all share a square colour.
fn insufficient_material(board: &Board) -> bool {
    let heavy = *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy.popcnt() > 0 {
        return false;
    }

    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops: BitBoard = *board.pieces(Piece::Bishop);

    if knights + bishops.popcnt() <= 1 {
        return true;
    }
    if knights > 0 {
        return false;
    }

    let mut shades = bishops.map(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2);
    match shades.next() {
        Some(first) => shades.all(|shade| shade == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    #[test]
    fn test_bare_kings_insufficient() {
        assert!(insufficient_material(&board("8/8/8/4k3/8/8/8/4K3 w - - 0 1")));
    }

    #[test]
    fn test_single_knight_insufficient() {
        assert!(insufficient_material(&board("8/8/8/4k3/8/8/8/3NK3 w - - 0 1")));
    }

    #[test]
    fn test_same_shade_bishops_insufficient() {
        // c1 and f4 are both dark squares.
        assert!(insufficient_material(&board("8/8/8/4k3/5b2/8/8/2B1K3 w - - 0 1")));
    }

    #[test]
    fn test_opposite_shade_bishops_sufficient() {
        // c1 is dark, f5 is light.
        assert!(!insufficient_material(&board("8/8/8/4kb2/8/8/8/2B1K3 w - - 0 1")));
    }

    #[test]
    fn test_rook_is_sufficient() {
        assert!(!insufficient_material(&board("8/8/8/4k3/8/8/8/R3K3 w - - 0 1")));
    }
}
