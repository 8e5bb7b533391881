//! Session creation, seat assignment and seat release.

use crate::registry::REGISTRY_LOCK;
use crate::{Arena, ArenaError, ErrorKind, Session, Ticket};
use rand::Rng;
use rand::seq::SliceRandom;
use strictly_chess::{MoveOracle, Side};
use tracing::{debug, info, instrument, warn};

/// Letters used in ticket ids. Omits I, L and O, which read like digits.
pub(crate) const TICKET_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ";

/// Result of taking a seat.
#[derive(Debug, Clone)]
pub struct JoinReceipt {
    /// The session after seating.
    pub session: Session,
    /// The seat taken.
    pub side: Side,
    /// The ticket to use for every later call.
    pub ticket: Ticket,
}

/// Random ticket id of `length` letters from [`TICKET_ALPHABET`].
pub(crate) fn random_ticket_id(rng: &mut impl Rng, length: usize) -> String {
    (0..length)
        .filter_map(|_| TICKET_ALPHABET.choose(rng).map(|b| *b as char))
        .collect()
}

impl<O: MoveOracle> Arena<O> {
    /// Creates a new active session.
    ///
    /// Ids come from the pool `"1"..=session_pool_size`: the first unused id,
    /// or, once every id is taken, the id of the terminal session that was
    /// updated longest ago.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` naming the busy session if another session is still
    /// active, or `Timeout`/`Storage` from the lock and store.
    #[instrument(skip(self))]
    pub fn create_session(&self) -> Result<Session, ArenaError> {
        self.locks.with_lock(REGISTRY_LOCK, || {
            if let Some(busy) = self.active_session()? {
                warn!(session_id = %busy.id, "Another session is still active");
                return Err(ArenaError::conflict(format!(
                    "Session {} is still active",
                    busy.id
                )));
            }

            let id = self.allocate_id()?;
            let mut session = Session::new(id.clone(), self.oracle.initial_position());

            self.with_session_lock(&id, || {
                if let Ok(previous) = self.store.load_session(&id) {
                    self.retire_tickets(&previous);
                }
                self.store.save_session(&mut session)
            })?;
            self.registry.claim(&id)?;

            info!(session_id = %id, "Session created");
            Ok(session)
        })
    }

    /// Picks the id for a new session. Call with the registry lock held.
    fn allocate_id(&self) -> Result<String, ArenaError> {
        let pool = *self.config.session_pool_size();

        if let Some(free) = (1..=pool)
            .map(|n| n.to_string())
            .find(|id| !self.store.session_exists(id))
        {
            debug!(session_id = %free, "Using unused session id");
            return Ok(free);
        }

        let mut oldest: Option<Session> = None;
        for n in 1..=pool {
            let id = n.to_string();
            let session = match self.get_session(&id) {
                Ok(session) => session,
                Err(e) if matches!(e.kind, ErrorKind::Storage) => {
                    warn!(session_id = %id, error = %e, "Recycling unreadable session id");
                    return Ok(id);
                }
                Err(e) => return Err(e),
            };

            if session.is_active() {
                return Err(ArenaError::conflict(format!(
                    "Session {} is still active",
                    session.id
                )));
            }
            if oldest.as_ref().is_none_or(|o| session.updated_at < o.updated_at) {
                oldest = Some(session);
            }
        }

        let recycled = oldest
            .map(|s| s.id)
            .ok_or_else(|| ArenaError::conflict("No session id is available"))?;
        info!(session_id = %recycled, "Recycling oldest finished session id");
        Ok(recycled)
    }

    /// Deletes the tickets seated in a session that is being replaced.
    fn retire_tickets(&self, previous: &Session) {
        for side in [Side::White, Side::Black] {
            if let Some(ticket) = previous.seats.get(side) {
                if let Err(e) = self.store.delete_ticket(ticket) {
                    warn!(ticket = %ticket, error = %e, "Failed to retire ticket");
                }
            }
        }
    }

    /// Takes a seat in session `session_id`.
    ///
    /// A free `preferred` side is honoured; otherwise a free side is chosen,
    /// at random when both are free.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank agent name, `Conflict` if the session
    /// has ended or both seats are taken, `NotFound` for an unknown session,
    /// or `Timeout`/`Storage` from the lock and store.
    #[instrument(skip(self))]
    pub fn join_session(
        &self,
        session_id: &str,
        agent: &str,
        preferred: Option<Side>,
    ) -> Result<JoinReceipt, ArenaError> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(ArenaError::validation("Agent name must not be empty"));
        }

        self.with_session_lock(session_id, || {
            let mut session = self.load_fresh(session_id)?;
            if !session.is_active() {
                return Err(ArenaError::conflict(format!(
                    "Session {} has already finished ({})",
                    session.id, session.status
                )));
            }

            let mut rng = rand::thread_rng();
            let vacant = session.seats.vacant();
            let side = match (preferred, vacant.as_slice()) {
                (_, []) => {
                    return Err(ArenaError::conflict(format!(
                        "Both seats in session {} are occupied",
                        session.id
                    )));
                }
                (Some(wanted), free) if free.contains(&wanted) => wanted,
                (_, [only]) => *only,
                (_, _) => {
                    if rng.gen_bool(0.5) {
                        Side::White
                    } else {
                        Side::Black
                    }
                }
            };

            let ticket_id = self.mint_ticket_id(&mut rng)?;
            let ticket = Ticket::new(ticket_id, session.id.clone(), agent, side);

            session.seats.set(side, Some(ticket.ticket_id.clone()));
            session.seat_agents.set(side, Some(agent.to_string()));
            if session.is_full() && session.history.is_empty() {
                session.turn_started_at = chrono::Utc::now();
            }

            self.store.save_ticket(&ticket)?;
            self.persist(&mut session)?;

            info!(
                session_id = %session.id,
                side = %side,
                ticket = %ticket.ticket_id,
                agent = %agent,
                "Seat assigned"
            );
            Ok(JoinReceipt {
                session,
                side,
                ticket,
            })
        })
    }

    fn mint_ticket_id(&self, rng: &mut impl Rng) -> Result<String, ArenaError> {
        let attempts = *self.config.ticket_attempts();
        let length = *self.config.ticket_length();

        for _ in 0..attempts {
            let candidate = random_ticket_id(rng, length);
            if !self.store.ticket_exists(&candidate) {
                return Ok(candidate);
            }
            debug!(candidate = %candidate, "Ticket id collision, retrying");
        }

        Err(ArenaError::conflict(format!(
            "Could not mint a unique ticket id in {} attempts",
            attempts
        )))
    }

    /// Joins the active session, creating one if none is active.
    ///
    /// # Errors
    ///
    /// See [`Arena::create_session`] and [`Arena::join_session`].
    #[instrument(skip(self))]
    pub fn join(&self, agent: &str, preferred: Option<Side>) -> Result<JoinReceipt, ArenaError> {
        let session_id = match self.active_session()? {
            Some(session) => session.id,
            None => match self.create_session() {
                Ok(session) => session.id,
                Err(e) if e.kind == ErrorKind::Conflict => {
                    // Lost a creation race; join whichever session won.
                    debug!(error = %e, "Session created concurrently");
                    self.active_session()?.map(|s| s.id).ok_or(e)?
                }
                Err(e) => return Err(e),
            },
        };

        self.join_session(&session_id, agent, preferred)
    }

    /// Releases a seat whose holder is leaving before an opponent arrived.
    ///
    /// Returns `false` if the ticket no longer holds its seat (already
    /// released, or the ticket is unknown), `true` if the seat was freed.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the opponent has already joined, since a paired
    /// seat cannot be silently vacated, or `Timeout`/`Storage` from the lock
    /// and store.
    #[instrument(skip(self))]
    pub fn abandon_if_unpaired(&self, ticket_id: &str) -> Result<bool, ArenaError> {
        let ticket = match self.store.load_ticket(ticket_id) {
            Ok(ticket) => ticket,
            Err(e) if e.kind == ErrorKind::NotFound => {
                debug!("Ticket already gone");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.with_session_lock(&ticket.session_id, || {
            let mut session = match self.store.load_session(&ticket.session_id) {
                Ok(session) => session,
                Err(e) if e.kind == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            };

            if !session.seat_matches(ticket.side, &ticket.ticket_id) {
                debug!("Seat no longer held by this ticket");
                return Ok(false);
            }
            if session.seats.is_set(ticket.side.opponent()) {
                return Err(ArenaError::conflict(
                    "Opponent has already joined; the seat cannot be released",
                ));
            }

            session.seats.set(ticket.side, None);
            session.seat_agents.set(ticket.side, None);
            self.persist(&mut session)?;
            self.store.delete_ticket(&ticket.ticket_id)?;

            info!(session_id = %session.id, side = %ticket.side, "Seat released");
            Ok(true)
        })
    }
}
