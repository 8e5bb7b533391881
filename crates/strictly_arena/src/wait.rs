//! Blocking waits that discover opponent progress by polling the store.
//!
//! There is no push channel between processes. Each wait re-reads the
//! session every `poll_interval` until its condition holds, the session ends,
//! or the deadline passes. Running out of time is an ordinary outcome.

use crate::{Arena, ArenaError, ErrorKind, JoinReceipt, Session, TicketView};
use std::time::Duration;
use strictly_chess::{MoveOracle, Side};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The awaited condition holds.
    Ready(Session),
    /// The session ended first.
    Finished(Session),
    /// The deadline passed.
    TimedOut,
}

impl<O: MoveOracle + Clone + Send + Sync + 'static> Arena<O> {
    /// Resolves a ticket on the blocking pool. The read may have to wait for
    /// a session lock, which must not stall the async worker.
    async fn read_ticket(&self, ticket_id: &str) -> Result<TicketView, ArenaError> {
        let arena = self.clone();
        let ticket_id = ticket_id.to_string();
        tokio::task::spawn_blocking(move || arena.session_for_ticket(&ticket_id))
            .await
            .map_err(|e| ArenaError::storage(format!("Session read task failed: {}", e)))?
    }

    /// Polls until `ready` holds for the ticket's session.
    async fn poll_ticket(
        &self,
        ticket_id: &str,
        deadline: Duration,
        ready: impl Fn(&TicketView) -> bool,
    ) -> Result<WaitOutcome, ArenaError> {
        let until = Instant::now() + deadline;
        let interval = self.config.poll_interval();

        loop {
            let view = self.read_ticket(ticket_id).await?;
            if !view.seated {
                return Err(ArenaError::conflict(format!(
                    "Ticket {} no longer holds the {} seat",
                    view.ticket.ticket_id, view.ticket.side
                )));
            }
            if !view.session.is_active() {
                debug!(status = %view.session.status, "Session ended while waiting");
                return Ok(WaitOutcome::Finished(view.session));
            }
            if ready(&view) {
                return Ok(WaitOutcome::Ready(view.session));
            }

            let now = Instant::now();
            if now >= until {
                info!(ticket = %ticket_id, "Wait timed out");
                return Ok(WaitOutcome::TimedOut);
            }
            sleep(interval.min(until - now)).await;
        }
    }

    /// Waits until both seats are occupied.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket loses its seat, or any read error.
    #[instrument(skip(self))]
    pub async fn wait_for_opponent(
        &self,
        ticket_id: &str,
        deadline: Duration,
    ) -> Result<WaitOutcome, ArenaError> {
        self.poll_ticket(ticket_id, deadline, |view| view.session.is_full())
            .await
    }

    /// Waits until it is the ticket's turn.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket loses its seat, or any read error.
    #[instrument(skip(self))]
    pub async fn wait_for_turn(
        &self,
        ticket_id: &str,
        deadline: Duration,
    ) -> Result<WaitOutcome, ArenaError> {
        self.poll_ticket(ticket_id, deadline, |view| {
            view.session.is_full() && view.session.turn == view.ticket.side
        })
        .await
    }

    /// Waits for the opponent to answer: more than `after_ply` moves played
    /// and the turn back with the ticket.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ticket loses its seat, or any read error.
    #[instrument(skip(self))]
    pub async fn wait_for_reply(
        &self,
        ticket_id: &str,
        after_ply: usize,
        deadline: Duration,
    ) -> Result<WaitOutcome, ArenaError> {
        self.poll_ticket(ticket_id, deadline, |view| {
            view.session.ply() > after_ply && view.session.turn == view.ticket.side
        })
        .await
    }

    /// Joins (finding or creating the active session) and waits for an
    /// opponent.
    ///
    /// The seat is released if the wait errors, times out, or the returned
    /// future is dropped before an opponent arrives, as happens when the
    /// caller is interrupted. An opponent who joins as the deadline passes
    /// still counts: the outcome is then `Ready` and the seat is kept.
    ///
    /// # Errors
    ///
    /// See [`Arena::join`] and [`Arena::wait_for_opponent`].
    #[instrument(skip(self))]
    pub async fn join_and_wait(
        &self,
        agent: &str,
        preferred: Option<Side>,
        deadline: Duration,
    ) -> Result<(JoinReceipt, WaitOutcome), ArenaError> {
        let receipt = self.join(agent, preferred)?;
        let guard = UnpairedSeat::new(self, &receipt.ticket.ticket_id);

        let outcome = self
            .wait_for_opponent(&receipt.ticket.ticket_id, deadline)
            .await?;
        guard.keep();

        let outcome = match outcome {
            WaitOutcome::TimedOut => self.settle_unpaired(&receipt.ticket.ticket_id)?,
            other => other,
        };
        Ok((receipt, outcome))
    }
}

impl<O: MoveOracle> Arena<O> {
    /// Releases the seat of a ticket whose wait for an opponent ran out.
    ///
    /// If the opponent arrived in the meantime the seat is kept and the
    /// session is reported as `Ready` (or `Finished`).
    pub(crate) fn settle_unpaired(&self, ticket_id: &str) -> Result<WaitOutcome, ArenaError> {
        match self.abandon_if_unpaired(ticket_id) {
            Ok(released) => {
                debug!(ticket = %ticket_id, released, "Unpaired seat settled");
                Ok(WaitOutcome::TimedOut)
            }
            Err(e) if e.kind == ErrorKind::Conflict => {
                let view = self.session_for_ticket(ticket_id)?;
                if !view.seated {
                    return Ok(WaitOutcome::TimedOut);
                }
                info!(ticket = %ticket_id, "Opponent arrived as the wait ended");
                if view.session.is_active() {
                    Ok(WaitOutcome::Ready(view.session))
                } else {
                    Ok(WaitOutcome::Finished(view.session))
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Releases a seat on drop unless [`UnpairedSeat::keep`] was called.
#[derive(Debug)]
pub struct UnpairedSeat<'a, O: MoveOracle> {
    arena: &'a Arena<O>,
    ticket_id: String,
    armed: bool,
}

impl<'a, O: MoveOracle> UnpairedSeat<'a, O> {
    /// Arms a release for `ticket_id`.
    pub fn new(arena: &'a Arena<O>, ticket_id: &str) -> Self {
        Self {
            arena,
            ticket_id: ticket_id.to_string(),
            armed: true,
        }
    }

    /// Keeps the seat.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl<O: MoveOracle> Drop for UnpairedSeat<'_, O> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.arena.abandon_if_unpaired(&self.ticket_id) {
            Ok(true) => info!(ticket = %self.ticket_id, "Released unpaired seat"),
            Ok(false) => debug!(ticket = %self.ticket_id, "Seat already released"),
            Err(e) => warn!(ticket = %self.ticket_id, error = %e, "Could not release seat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArenaConfig;
    use tempfile::TempDir;

    fn arena(dir: &TempDir) -> Arena {
        Arena::with_chess(ArenaConfig::default().with_data_dir(dir.path())).unwrap()
    }

    #[test]
    fn test_settle_releases_lone_seat() {
        let dir = TempDir::new().unwrap();
        let arena = arena(&dir);
        let alice = arena.join("alice", None).unwrap();

        assert_eq!(arena.settle_unpaired(&alice.ticket.ticket_id).unwrap(), WaitOutcome::TimedOut);
        let session = arena.get_session(&alice.session.id).unwrap();
        assert_eq!(session.seats.vacant().len(), 2);
    }

    #[test]
    fn test_settle_keeps_seat_when_opponent_arrived_late() {
        let dir = TempDir::new().unwrap();
        let arena = arena(&dir);
        let alice = arena.join("alice", None).unwrap();
        arena.join("bob", None).unwrap();

        let outcome = arena.settle_unpaired(&alice.ticket.ticket_id).unwrap();
        let WaitOutcome::Ready(session) = outcome else {
            panic!("Expected Ready, got {:?}", outcome);
        };
        assert!(session.is_full());
        assert!(arena.store().ticket_exists(&alice.ticket.ticket_id));
    }
}
