//! Plain-text output for the CLI.

use strictly_arena::{JoinReceipt, MoveRecord, Session, Side};
use strictly_chess::render_board;

pub fn print_join(receipt: &JoinReceipt) {
    println!("Session: {}", receipt.session.id);
    println!("Side:    {}", receipt.side);
    println!("Ticket:  {}", receipt.ticket.ticket_id);
}

pub fn print_move(record: &MoveRecord) {
    println!(
        "Ply {}: {} played {} ({}) - {}",
        record.ply, record.side, record.notation, record.think_time, record.rationale
    );
}

pub fn print_draw_prompt(session: &Session) {
    let offerer = session
        .pending_draw
        .as_ref()
        .map(|p| p.side.to_string())
        .unwrap_or_else(|| "Your opponent".to_string());
    println!("{} offered a draw in session {}.", offerer, session.id);
    println!("Run accept-draw to accept, or play again to decline and move.");
}

fn seat_line(session: &Session, side: Side) -> String {
    match session.seat_agents.get(side) {
        Some(agent) => agent.clone(),
        None => "(empty)".to_string(),
    }
}

pub fn print_session(session: &Session) {
    println!("Session {} [{}]", session.id, session.status);
    println!("White: {}", seat_line(session, Side::White));
    println!("Black: {}", seat_line(session, Side::Black));

    if session.is_active() {
        println!("To move: {}", session.turn);
    } else {
        match session.winner {
            Some(winner) => println!("Winner: {}", winner),
            None => println!("Result: no winner"),
        }
    }
    if let Some(pending) = &session.pending_draw {
        println!("Draw offered by {}", pending.side);
    }
    println!("Moves: {}", session.ply());

    if let Some(position) = session.current_position() {
        println!();
        println!("{}", render_board(position));
    }
}

pub fn print_listing(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("No sessions.");
        return;
    }
    for session in sessions {
        println!(
            "{:>3}  {:<26} moves={:<4} white={} black={}",
            session.id,
            session.status.to_string(),
            session.ply(),
            seat_line(session, Side::White),
            seat_line(session, Side::Black)
        );
    }
}
