//! Move submission and the illegal-move forfeiture rule.

use crate::{Arena, ArenaError, IllegalAttempt, MoveRecord, Session, SessionStatus, Ticket};
use chrono::Utc;
use derive_new::new;
use strictly_chess::{MoveInput, MoveOracle, Verdict};
use tracing::{info, instrument, warn};

/// Annotations an agent attaches to a move.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MoveNotes {
    /// Why the agent chose the move. Required.
    pub rationale: String,
}

/// Result of an applied move.
#[derive(Debug, Clone)]
pub struct MoveReceipt {
    /// The session after the move.
    pub session: Session,
    /// The history entry that was appended.
    pub record: MoveRecord,
}

/// Length of the run of most recent attempts made by `ticket`, stopping at
/// the first attempt by anyone else.
pub(crate) fn illegal_streak(attempts: &[IllegalAttempt], ticket: &str) -> usize {
    attempts
        .iter()
        .rev()
        .take_while(|a| a.ticket.eq_ignore_ascii_case(ticket))
        .count()
}

fn format_think_time(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

impl<O: MoveOracle> Arena<O> {
    /// Submits a move for the seat `ticket_id` holds.
    ///
    /// Rejections other than input validation are recorded on the session
    /// before the error is returned. When such a rejection completes a run of
    /// `illegal_streak_limit` attempts by the same seated ticket, the session
    /// is forfeited to the opponent as a side effect; the call still fails,
    /// so callers re-read the session to observe the forfeit.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed ticket, blank move or blank rationale
    /// - `NotFound` for an unknown ticket or session
    /// - `Conflict` if the opponent has not joined yet
    /// - `IllegalMove` for a finished session, a turn violation, a stale
    ///   ticket, or a move the oracle rejects
    /// - `Timeout`/`Storage` from the lock and store
    #[instrument(skip(self, notes))]
    pub fn submit_move(
        &self,
        ticket_id: &str,
        raw_input: &str,
        notes: &MoveNotes,
    ) -> Result<MoveReceipt, ArenaError> {
        if notes.rationale.trim().is_empty() {
            return Err(ArenaError::validation("A rationale is required with every move"));
        }
        let input = MoveInput::parse(raw_input).map_err(|e| ArenaError::validation(e.to_string()))?;
        let ticket = self.store.load_ticket(ticket_id)?;

        self.with_session_lock(&ticket.session_id, || {
            let mut session = self.load_fresh(&ticket.session_id)?;
            self.apply_locked(&mut session, &ticket, raw_input, &input, notes)
        })
    }

    fn apply_locked(
        &self,
        session: &mut Session,
        ticket: &Ticket,
        raw_input: &str,
        input: &MoveInput,
        notes: &MoveNotes,
    ) -> Result<MoveReceipt, ArenaError> {
        if !session.is_active() {
            let reason = format!("Session already finished ({})", session.status);
            return Err(self.reject(session, ticket, raw_input, reason, false));
        }

        let seated = session.seat_matches(ticket.side, &ticket.ticket_id);
        if !seated {
            let reason = format!("Ticket {} no longer holds the {} seat", ticket.ticket_id, ticket.side);
            return Err(self.reject(session, ticket, raw_input, reason, false));
        }

        let turn = session.turn;
        match session.seats.get(turn) {
            None => {
                let reason = format!("No agent occupies the {} seat", turn);
                return Err(self.reject(session, ticket, raw_input, reason, true));
            }
            Some(holder) if !holder.eq_ignore_ascii_case(&ticket.ticket_id) => {
                let reason = format!("Not your turn: {} to move", turn);
                return Err(self.reject(session, ticket, raw_input, reason, true));
            }
            Some(_) => {}
        }

        if !session.seats.is_set(ticket.side.opponent()) {
            return Err(ArenaError::conflict("Opponent has not joined yet"));
        }

        let before = session
            .current_position()
            .cloned()
            .ok_or_else(|| ArenaError::storage("Session has no current position"))?;

        let accepted = match self.oracle.apply_move(&session.positions, input) {
            Verdict::Accepted(accepted) => accepted,
            Verdict::Rejected { reason } => {
                return Err(self.reject(session, ticket, raw_input, reason, true));
            }
        };

        let now = Utc::now();
        let elapsed_ms = now
            .signed_duration_since(session.turn_started_at)
            .num_milliseconds()
            .max(0) as u64;

        let record = MoveRecord {
            ply: session.history.len() as u32 + 1,
            side: turn,
            ticket: ticket.ticket_id.clone(),
            notation: accepted.notation().clone(),
            input: raw_input.trim().to_string(),
            position_before: before,
            position_after: accepted.position().clone(),
            rationale: notes.rationale.trim().to_string(),
            think_time: format_think_time(elapsed_ms),
            turn_duration_ms: elapsed_ms,
            played_at: now,
        };

        session.history.push(record.clone());
        session.positions.push(accepted.position().clone());
        session.turn = turn.opponent();
        session.pending_draw = None;
        session.turn_started_at = now;

        if let Some(kind) = *accepted.terminal() {
            let winner = kind.is_decisive().then_some(turn);
            session.finish(SessionStatus::from(kind), winner);
            info!(session_id = %session.id, status = %session.status, winner = ?session.winner, "Session finished");
        }

        self.persist(session)?;

        info!(
            session_id = %session.id,
            ply = record.ply,
            side = %turn,
            notation = %record.notation,
            "Move applied"
        );
        Ok(MoveReceipt {
            session: session.clone(),
            record,
        })
    }

    /// Records a rejected attempt, applies the streak rule when `counts`,
    /// persists, and returns the error to hand back to the caller.
    fn reject(
        &self,
        session: &mut Session,
        ticket: &Ticket,
        raw_input: &str,
        reason: String,
        counts: bool,
    ) -> ArenaError {
        warn!(session_id = %session.id, ticket = %ticket.ticket_id, reason = %reason, "Move rejected");

        session.illegal_attempts.push(IllegalAttempt {
            ticket: ticket.ticket_id.clone(),
            side: Some(ticket.side),
            input: raw_input.trim().to_string(),
            reason: reason.clone(),
            turn: session.turn,
            status: session.status,
            ply: session.history.len() as u32,
            position: session.current_position().cloned().unwrap_or_default(),
            attempted_at: Utc::now(),
        });

        let limit = *self.config.illegal_streak_limit();
        if counts && session.is_active() {
            let streak = illegal_streak(&session.illegal_attempts, &ticket.ticket_id);
            if streak >= limit {
                session.finish(SessionStatus::ForfeitIllegalMoves, Some(ticket.side.opponent()));
                warn!(
                    session_id = %session.id,
                    loser = %ticket.side,
                    streak,
                    "Illegal move limit reached, session forfeited"
                );
            }
        }

        if let Err(e) = self.persist(session) {
            return e;
        }

        let message = if session.status == SessionStatus::ForfeitIllegalMoves && counts {
            format!("{}; {} illegal attempts in a row forfeit the game", reason, limit)
        } else {
            reason
        };
        ArenaError::illegal_move(message)
    }
}
