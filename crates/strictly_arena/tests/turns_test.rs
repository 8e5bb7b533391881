//! Tests for move submission, terminal detection and illegal-move forfeits.

use strictly_arena::{
    Arena, ArenaConfig, ErrorKind, JoinReceipt, MoveNotes, Session, SessionStatus, Side,
};
use tempfile::TempDir;

fn setup_arena() -> (TempDir, Arena) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = ArenaConfig::default()
        .with_data_dir(dir.path())
        .with_lock_retry_ms(5);
    let arena = Arena::with_chess(config).expect("Failed to open arena");
    (dir, arena)
}

/// Seats white then black in a fresh session.
fn paired(arena: &Arena) -> (JoinReceipt, JoinReceipt) {
    let white = arena.join("alice", Some(Side::White)).expect("White join failed");
    let black = arena.join("bob", Some(Side::Black)).expect("Black join failed");
    (white, black)
}

fn notes(text: &str) -> MoveNotes {
    MoveNotes::new(text.to_string())
}

fn reload(arena: &Arena, id: &str) -> Session {
    arena.get_session(id).expect("Reload failed")
}

fn assert_positions_track_history(session: &Session) {
    assert_eq!(session.positions.len(), session.history.len() + 1);
}

#[test]
fn test_legal_move_flips_turn() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    let receipt = arena
        .submit_move(&white.ticket.ticket_id, "e2e4", &notes("Open the centre"))
        .expect("Move failed");

    assert_eq!(receipt.record.ply, 1);
    assert_eq!(receipt.record.side, Side::White);
    assert_eq!(receipt.record.notation, "e2e4");
    assert_eq!(receipt.record.rationale, "Open the centre");
    assert!(receipt.record.think_time.ends_with('s'));
    assert_eq!(receipt.session.turn, Side::Black);

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.ply(), 1);
    assert_eq!(session.turn, Side::Black);
    assert_eq!(
        session.history[0].position_after,
        *session.current_position().expect("No position")
    );
    assert_positions_track_history(&session);
}

#[test]
fn test_san_input_is_accepted() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    let receipt = arena
        .submit_move(&white.ticket.ticket_id, "Nf3", &notes("Develop"))
        .expect("Move failed");
    assert_eq!(receipt.record.notation, "g1f3");
    assert_eq!(receipt.record.input, "Nf3");
}

#[test]
fn test_out_of_turn_is_recorded() {
    let (_dir, arena) = setup_arena();
    let (white, black) = paired(&arena);

    let err = arena
        .submit_move(&black.ticket.ticket_id, "e7e5", &notes("Eager"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMove);
    assert!(err.message.contains("Not your turn"), "{}", err.message);

    let session = reload(&arena, &white.session.id);
    assert!(session.history.is_empty());
    assert_eq!(session.turn, Side::White);
    assert_eq!(session.illegal_attempts.len(), 1);

    let attempt = &session.illegal_attempts[0];
    assert_eq!(attempt.ticket, black.ticket.ticket_id);
    assert_eq!(attempt.input, "e7e5");
    assert_eq!(attempt.turn, Side::White);
    assert_positions_track_history(&session);
}

#[test]
fn test_oracle_rejection_is_recorded() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    let err = arena
        .submit_move(&white.ticket.ticket_id, "e2e5", &notes("Too far"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMove);

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.illegal_attempts.len(), 1);
    assert!(session.is_active());
}

#[test]
fn test_move_before_opponent_joins() {
    let (_dir, arena) = setup_arena();
    let white = arena.join("alice", Some(Side::White)).expect("Join failed");

    let err = arena
        .submit_move(&white.ticket.ticket_id, "e2e4", &notes("Alone"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let session = reload(&arena, &white.session.id);
    assert!(session.illegal_attempts.is_empty());
}

#[test]
fn test_validation_leaves_no_trace() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    let err = arena
        .submit_move(&white.ticket.ticket_id, "e2e4", &notes("  "))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = arena
        .submit_move(&white.ticket.ticket_id, "   ", &notes("Nothing"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let session = reload(&arena, &white.session.id);
    assert!(session.illegal_attempts.is_empty());
    assert!(session.history.is_empty());
}

#[test]
fn test_fifth_illegal_attempt_forfeits() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    for _ in 0..4 {
        let err = arena
            .submit_move(&white.ticket.ticket_id, "e2e5", &notes("Again"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalMove);
        assert!(!err.message.contains("forfeit"), "{}", err.message);
    }
    assert!(reload(&arena, &white.session.id).is_active());

    let err = arena
        .submit_move(&white.ticket.ticket_id, "e2e5", &notes("Again"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMove);
    assert!(err.message.contains("forfeit"), "{}", err.message);

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.status, SessionStatus::ForfeitIllegalMoves);
    assert_eq!(session.winner, Some(Side::Black));
    assert_eq!(session.illegal_attempts.len(), 5);
    assert!(arena.active_session().expect("Query failed").is_none());
}

#[test]
fn test_streak_broken_by_other_ticket() {
    let (_dir, arena) = setup_arena();
    let (white, black) = paired(&arena);

    for _ in 0..4 {
        arena
            .submit_move(&white.ticket.ticket_id, "e2e5", &notes("Again"))
            .unwrap_err();
    }
    arena
        .submit_move(&black.ticket.ticket_id, "e7e5", &notes("Eager"))
        .unwrap_err();
    arena
        .submit_move(&white.ticket.ticket_id, "e2e5", &notes("Again"))
        .unwrap_err();

    let session = reload(&arena, &white.session.id);
    assert!(session.is_active());
    assert_eq!(session.illegal_attempts.len(), 6);
}

#[test]
fn test_checkmate_names_winner() {
    let (_dir, arena) = setup_arena();
    let (white, black) = paired(&arena);

    let moves = [
        (&white, "f2f3"),
        (&black, "e7e5"),
        (&white, "g2g4"),
        (&black, "d8h4"),
    ];
    let mut last = None;
    for (receipt, mv) in moves {
        last = Some(
            arena
                .submit_move(&receipt.ticket.ticket_id, mv, &notes("Line"))
                .expect("Move failed"),
        );
    }

    let last = last.expect("No moves played");
    assert_eq!(last.session.status, SessionStatus::Checkmate);
    assert_eq!(last.session.winner, Some(Side::Black));

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.status, SessionStatus::Checkmate);
    assert_eq!(session.ply(), 4);
    assert_positions_track_history(&session);
    assert!(arena.active_session().expect("Query failed").is_none());
}

#[test]
fn test_move_after_finish_rejected_without_forfeit() {
    let (_dir, arena) = setup_arena();
    let (white, black) = paired(&arena);
    arena.offer_draw(&white.ticket.ticket_id).expect("Offer failed");
    arena.accept_draw(&black.ticket.ticket_id).expect("Accept failed");

    for _ in 0..6 {
        let err = arena
            .submit_move(&white.ticket.ticket_id, "e2e4", &notes("Late"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalMove);
        assert!(err.message.contains("already finished"), "{}", err.message);
    }

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.status, SessionStatus::DrawAgreement);
    assert_eq!(session.winner, None);
    assert_eq!(session.illegal_attempts.len(), 6);
}

#[test]
fn test_unseated_ticket_rejected() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    // Someone else now holds white's seat.
    let mut session = reload(&arena, &white.session.id);
    session.seats.set(Side::White, Some("QQQQQQ".to_string()));
    arena.store().save_session(&mut session).expect("Save failed");

    let err = arena
        .submit_move(&white.ticket.ticket_id, "e2e4", &notes("Mine"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMove);
    assert!(err.message.contains("no longer holds"), "{}", err.message);

    let view = arena
        .session_for_ticket(&white.ticket.ticket_id)
        .expect("Lookup failed");
    assert!(!view.seated);
    assert!(view.session.history.is_empty());
}

#[test]
fn test_revision_increases_with_each_write() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);
    let before = reload(&arena, &white.session.id).revision;

    arena
        .submit_move(&white.ticket.ticket_id, "d2d4", &notes("Queen's pawn"))
        .expect("Move failed");
    let after = reload(&arena, &white.session.id).revision;
    assert!(after > before);
}

#[test]
fn test_second_move_out_of_turn_appends_one_attempt() {
    let (_dir, arena) = setup_arena();
    let (white, _black) = paired(&arena);

    arena
        .submit_move(&white.ticket.ticket_id, "e2e4", &notes("King's pawn"))
        .expect("Move failed");
    let err = arena
        .submit_move(&white.ticket.ticket_id, "d2d4", &notes("Again"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMove);
    assert!(err.message.contains("Not your turn"), "{}", err.message);

    let session = reload(&arena, &white.session.id);
    assert_eq!(session.ply(), 1);
    assert_eq!(session.turn, Side::Black);
    assert_eq!(session.illegal_attempts.len(), 1);
    assert_eq!(session.illegal_attempts[0].input, "d2d4");
    assert_eq!(session.illegal_attempts[0].ticket, white.ticket.ticket_id);
    assert_positions_track_history(&session);
}
