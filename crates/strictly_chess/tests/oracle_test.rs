//! Tests for the standard chess oracle.

use strictly_chess::{ChessOracle, MoveInput, MoveOracle, Position, TerminalKind, Verdict};

/// Plays `moves` from `start`, panicking on any rejection, and returns the
/// full line plus the terminal kind reported by the last move.
fn play(start: Position, moves: &[&str]) -> (Vec<Position>, Option<TerminalKind>) {
    let oracle = ChessOracle::new();
    let mut line = vec![start];
    let mut last = None;

    for mv in moves {
        let input = MoveInput::parse(mv).expect("Non-empty move");
        match oracle.apply_move(&line, &input) {
            Verdict::Accepted(accepted) => {
                last = *accepted.terminal();
                line.push(accepted.position().clone());
            }
            Verdict::Rejected { reason } => panic!("{mv} rejected: {reason}"),
        }
    }

    (line, last)
}

fn reject(start: Position, mv: &str) -> String {
    let oracle = ChessOracle::new();
    let input = MoveInput::parse(mv).expect("Non-empty move");
    match oracle.apply_move(&[start], &input) {
        Verdict::Accepted(_) => panic!("{mv} should be rejected"),
        Verdict::Rejected { reason } => reason,
    }
}

#[test]
fn test_opening_move_accepted() {
    let oracle = ChessOracle::new();
    let (line, terminal) = play(oracle.initial_position(), &["e2e4"]);
    assert_eq!(line.len(), 2);
    assert!(terminal.is_none());
    assert!(line[1].as_str().contains(" b "), "Black to move: {}", line[1]);
}

#[test]
fn test_san_and_coordinate_agree() {
    let oracle = ChessOracle::new();
    let (by_coordinate, _) = play(oracle.initial_position(), &["g1f3"]);
    let (by_san, _) = play(oracle.initial_position(), &["Nf3"]);
    assert_eq!(by_coordinate[1], by_san[1]);
}

#[test]
fn test_illegal_move_rejected() {
    let oracle = ChessOracle::new();
    let reason = reject(oracle.initial_position(), "e2e5");
    assert!(reason.contains("e2e5"), "Reason should name the move: {reason}");
}

#[test]
fn test_nonsense_rejected() {
    let oracle = ChessOracle::new();
    reject(oracle.initial_position(), "castle please");
}

#[test]
fn test_fools_mate() {
    let oracle = ChessOracle::new();
    let (_, terminal) = play(oracle.initial_position(), &["f2f3", "e7e5", "g2g4", "d8h4"]);
    assert_eq!(terminal, Some(TerminalKind::Checkmate));
    assert!(TerminalKind::Checkmate.is_decisive());
}

#[test]
fn test_stalemate() {
    let start = Position::new("k7/8/1K6/8/8/8/8/2Q5 w - - 0 1");
    let (_, terminal) = play(start, &["c1c7"]);
    assert_eq!(terminal, Some(TerminalKind::Stalemate));
    assert!(!TerminalKind::Stalemate.is_decisive());
}

#[test]
fn test_threefold_repetition() {
    let oracle = ChessOracle::new();
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];

    let (_, terminal) = play(oracle.initial_position(), &shuffle);
    assert!(terminal.is_none(), "Second occurrence is not yet a draw");

    let twice: Vec<&str> = shuffle.iter().chain(shuffle.iter()).copied().collect();
    let (_, terminal) = play(oracle.initial_position(), &twice);
    assert_eq!(terminal, Some(TerminalKind::Repetition));
}

#[test]
fn test_fifty_move_rule() {
    let start = Position::new("4k3/8/8/8/8/8/8/R3K3 w - - 99 80");
    let (line, terminal) = play(start, &["a1a2"]);
    assert_eq!(line[1].halfmove_clock(), 100);
    assert_eq!(terminal, Some(TerminalKind::FiftyMove));
}

#[test]
fn test_capture_into_bare_kings() {
    let start = Position::new("8/8/8/4k3/8/8/4r3/4K3 w - - 12 40");
    let (line, terminal) = play(start, &["e1e2"]);
    assert_eq!(terminal, Some(TerminalKind::InsufficientMaterial));
    assert_eq!(line[1].halfmove_clock(), 0, "Capture resets the clock");
}

#[test]
fn test_move_leaving_king_in_check_rejected() {
    let start = Position::new("8/8/8/4k3/4r3/8/8/4K2R w - - 0 1");
    reject(start, "h1h8");
}

#[test]
fn test_promotion_notation() {
    let oracle = ChessOracle::new();
    let start = Position::new("8/4P3/8/8/8/8/k7/4K3 w - - 7 30");
    let input = MoveInput::parse("e7e8q").expect("Non-empty move");
    match oracle.apply_move(&[start], &input) {
        Verdict::Accepted(accepted) => {
            assert_eq!(accepted.notation(), "e7e8q");
            assert_eq!(accepted.position().halfmove_clock(), 0);
        }
        Verdict::Rejected { reason } => panic!("Promotion rejected: {reason}"),
    }
}

#[test]
fn test_move_counters_advance() {
    let oracle = ChessOracle::new();
    let (line, _) = play(oracle.initial_position(), &["e2e4", "e7e5", "g1f3"]);
    assert_eq!(line[1].fullmove_number(), 1);
    assert_eq!(line[2].fullmove_number(), 2);
    assert_eq!(line[3].halfmove_clock(), 1);
}

#[test]
fn test_empty_line_rejected() {
    let oracle = ChessOracle::new();
    let input = MoveInput::parse("e2e4").expect("Non-empty move");
    assert!(matches!(oracle.apply_move(&[], &input), Verdict::Rejected { .. }));
}

#[test]
fn test_position_serializes_as_plain_string() {
    let json = serde_json::to_string(&Position::start()).expect("Serialize");
    assert!(json.starts_with("\"rnbqkbnr/"));
}
