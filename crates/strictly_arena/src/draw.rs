//! Draw offers: offer, accept, and the one-shot prompt gate.
//!
//! An offer stays pending until the opponent accepts it or moves twice: the
//! first play after the offer is interrupted so the agent can decide, the
//! second clears the offer and goes ahead.

use crate::{Arena, ArenaError, MoveNotes, MoveReceipt, PendingDraw, Session, SessionStatus, Ticket};
use strictly_chess::MoveOracle;
use tracing::{debug, info, instrument};

/// What the gate decided for a play call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawGate {
    /// No offer needs attention; submit the move.
    Proceed,
    /// An offer is pending and this caller has now been shown it.
    Prompt(Session),
}

/// Result of [`Arena::play`].
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    /// The opponent's draw offer interrupted the call; no move was submitted.
    DrawPending(Session),
    /// The move was applied.
    Moved(MoveReceipt),
}

impl<O: MoveOracle> Arena<O> {
    /// Loads a session under its lock and checks the ticket is seated.
    fn seated_session(&self, ticket: &Ticket) -> Result<Session, ArenaError> {
        let session = self.load_fresh(&ticket.session_id)?;
        if !session.seat_matches(ticket.side, &ticket.ticket_id) {
            return Err(ArenaError::conflict(format!(
                "Ticket {} no longer holds the {} seat",
                ticket.ticket_id, ticket.side
            )));
        }
        Ok(session)
    }

    /// Offers a draw to the opponent.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket is not seated, the session has ended,
    /// the opponent has not joined, or an offer is already pending (from
    /// either side); `NotFound`/`Validation` for a bad ticket.
    #[instrument(skip(self))]
    pub fn offer_draw(&self, ticket_id: &str) -> Result<Session, ArenaError> {
        let ticket = self.store.load_ticket(ticket_id)?;

        self.with_session_lock(&ticket.session_id, || {
            let mut session = self.seated_session(&ticket)?;
            if !session.is_active() {
                return Err(ArenaError::conflict(format!(
                    "Session {} has already finished ({})",
                    session.id, session.status
                )));
            }
            if !session.seats.is_set(ticket.side.opponent()) {
                return Err(ArenaError::conflict("Opponent has not joined yet"));
            }

            match &session.pending_draw {
                Some(pending) if pending.ticket.eq_ignore_ascii_case(&ticket.ticket_id) => {
                    return Err(ArenaError::conflict("You have already offered a draw"));
                }
                Some(_) => {
                    return Err(ArenaError::conflict(
                        "Your opponent has already offered a draw; accept it instead",
                    ));
                }
                None => {}
            }

            session.pending_draw = Some(PendingDraw::new(ticket.side, ticket.ticket_id.clone()));
            self.persist(&mut session)?;

            info!(session_id = %session.id, side = %ticket.side, "Draw offered");
            Ok(session)
        })
    }

    /// Accepts the opponent's pending draw offer.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket is not seated, the session has ended,
    /// no offer is pending, or the offer is the caller's own.
    #[instrument(skip(self))]
    pub fn accept_draw(&self, ticket_id: &str) -> Result<Session, ArenaError> {
        let ticket = self.store.load_ticket(ticket_id)?;

        self.with_session_lock(&ticket.session_id, || {
            let mut session = self.seated_session(&ticket)?;
            if !session.is_active() {
                return Err(ArenaError::conflict(format!(
                    "Session {} has already finished ({})",
                    session.id, session.status
                )));
            }

            match &session.pending_draw {
                None => return Err(ArenaError::conflict("No draw offer is pending")),
                Some(pending) if pending.ticket.eq_ignore_ascii_case(&ticket.ticket_id) => {
                    return Err(ArenaError::conflict("You cannot accept your own draw offer"));
                }
                Some(_) => {}
            }

            session.finish(SessionStatus::DrawAgreement, None);
            self.persist(&mut session)?;

            info!(session_id = %session.id, side = %ticket.side, "Draw accepted");
            Ok(session)
        })
    }

    /// Decides whether a play call must stop to show a pending draw offer.
    ///
    /// The first call after an opponent's offer is interrupted and marks the
    /// offer as shown to this ticket. The next call clears the offer, which
    /// declines it, and proceeds.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket no longer holds its seat,
    /// `NotFound`/`Validation` for a bad ticket, or `Timeout`/`Storage` from
    /// the lock and store.
    #[instrument(skip(self))]
    pub fn gate_on_pending_offer(&self, ticket_id: &str) -> Result<DrawGate, ArenaError> {
        let ticket = self.store.load_ticket(ticket_id)?;

        self.with_session_lock(&ticket.session_id, || {
            let mut session = self.seated_session(&ticket)?;

            let Some(pending) = session.pending_draw.as_mut() else {
                return Ok(DrawGate::Proceed);
            };
            if pending.ticket.eq_ignore_ascii_case(&ticket.ticket_id) {
                return Ok(DrawGate::Proceed);
            }

            let already_shown = pending
                .shown_to
                .as_deref()
                .is_some_and(|shown| shown.eq_ignore_ascii_case(&ticket.ticket_id));

            if already_shown {
                session.pending_draw = None;
                self.persist(&mut session)?;
                info!(session_id = %session.id, side = %ticket.side, "Draw offer lapsed");
                Ok(DrawGate::Proceed)
            } else {
                pending.shown_to = Some(ticket.ticket_id.clone());
                self.persist(&mut session)?;
                debug!(session_id = %session.id, side = %ticket.side, "Draw offer shown");
                Ok(DrawGate::Prompt(session))
            }
        })
    }

    /// The move-submission entry point: consults the draw gate, then submits.
    ///
    /// # Errors
    ///
    /// See [`Arena::submit_move`].
    #[instrument(skip(self, notes))]
    pub fn play(
        &self,
        ticket_id: &str,
        raw_input: &str,
        notes: &MoveNotes,
    ) -> Result<PlayOutcome, ArenaError> {
        if notes.rationale.trim().is_empty() {
            return Err(ArenaError::validation("A rationale is required with every move"));
        }

        match self.gate_on_pending_offer(ticket_id)? {
            DrawGate::Prompt(session) => Ok(PlayOutcome::DrawPending(session)),
            DrawGate::Proceed => self.submit_move(ticket_id, raw_input, notes).map(PlayOutcome::Moved),
        }
    }
}
