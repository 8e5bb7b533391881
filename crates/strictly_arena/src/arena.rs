//! The arena: one handle over the store, locks and oracle.

use crate::registry::ActiveRegistry;
use crate::{ArenaConfig, ArenaError, LockDir, RecordStore, Session, SessionStatus, Ticket};
use chrono::Utc;
use strictly_chess::{ChessOracle, MoveOracle};
use tracing::{debug, info, instrument, warn};

/// A ticket resolved against its live session.
#[derive(Debug, Clone)]
pub struct TicketView {
    /// The stored ticket.
    pub ticket: Ticket,
    /// The session it points at, freshly loaded.
    pub session: Session,
    /// Whether the session still seats this ticket.
    pub seated: bool,
}

/// Entry point for every session operation.
///
/// Each process opens its own `Arena` over the shared data directory; all
/// coordination goes through the records and locks stored there.
#[derive(Debug, Clone)]
pub struct Arena<O = ChessOracle> {
    pub(crate) config: ArenaConfig,
    pub(crate) store: RecordStore,
    pub(crate) locks: LockDir,
    pub(crate) registry: ActiveRegistry,
    pub(crate) oracle: O,
}

impl Arena<ChessOracle> {
    /// Opens an arena that plays standard chess.
    ///
    /// # Errors
    ///
    /// See [`Arena::open`].
    pub fn with_chess(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::open(config, ChessOracle::new())
    }
}

impl<O: MoveOracle> Arena<O> {
    /// Opens an arena over `config.data_dir`, creating directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unusable config or `Storage` if the data
    /// directory cannot be prepared.
    #[instrument(skip(config, oracle), fields(data_dir = %config.data_dir().display()))]
    pub fn open(config: ArenaConfig, oracle: O) -> Result<Self, ArenaError> {
        config
            .validate()
            .map_err(|e| ArenaError::validation(e.message))?;

        let store = RecordStore::open(config.data_dir(), oracle.initial_position())?;
        let locks = LockDir::new(
            store.lock_dir(),
            config.lock_timeout(),
            config.lock_retry(),
            config.lock_stale_after(),
        );
        let registry = ActiveRegistry::new(store.registry_path());

        info!("Arena opened");
        Ok(Self {
            config,
            store,
            locks,
            registry,
            oracle,
        })
    }

    /// Effective configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Underlying record store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The legality oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Runs `f` holding the lock for session `id`.
    pub(crate) fn with_session_lock<T>(
        &self,
        id: &str,
        f: impl FnOnce() -> Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        self.locks.with_lock(&format!("session-{}", id), f)
    }

    /// Saves a session. The active marker is left alone: it is only written
    /// under the registry lock, and a marker naming a finished session reads
    /// as no active session.
    pub(crate) fn persist(&self, session: &mut Session) -> Result<(), ArenaError> {
        self.store.save_session(session)?;
        if session.status.is_terminal() {
            debug!(session_id = %session.id, status = %session.status, "Finished session saved");
        }
        Ok(())
    }

    /// Draws an active session that has been idle too long. Returns whether
    /// it fired. Already-terminal sessions are left untouched.
    pub(crate) fn expire_if_idle(&self, session: &mut Session) -> bool {
        if !session.is_active() {
            return false;
        }

        let idle = Utc::now()
            .signed_duration_since(session.last_activity())
            .to_std()
            .unwrap_or_default();
        if idle < self.config.inactivity_limit() {
            return false;
        }

        info!(
            session_id = %session.id,
            idle_secs = idle.as_secs(),
            "Session idle too long, drawing"
        );
        session.finish(SessionStatus::DrawInactivityTimeout, None);
        true
    }

    /// Reloads a session and applies the inactivity rule, persisting if it
    /// fired. The caller must hold the session lock.
    pub(crate) fn load_fresh(&self, id: &str) -> Result<Session, ArenaError> {
        let mut session = self.store.load_session(id)?;
        if self.expire_if_idle(&mut session) {
            self.persist(&mut session)?;
        }
        Ok(session)
    }

    /// Applies the inactivity rule to session `id` and returns its state.
    ///
    /// Idempotent: once the session is terminal this only reads.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown session, `Timeout` if the lock is
    /// busy when a transition is due, or `Storage` on I/O failure.
    #[instrument(skip(self))]
    pub fn check_inactivity(&self, id: &str) -> Result<Session, ArenaError> {
        let mut session = self.store.load_session(id)?;
        if !self.expire_if_idle(&mut session) {
            return Ok(session);
        }

        // Re-check under the lock; a move may have landed since the read.
        self.with_session_lock(id, || self.load_fresh(id))
    }

    /// Read-only snapshot of a session, with inactivity applied first.
    ///
    /// # Errors
    ///
    /// See [`Arena::check_inactivity`].
    #[instrument(skip(self))]
    pub fn get_session(&self, id: &str) -> Result<Session, ArenaError> {
        self.check_inactivity(id)
    }

    /// Every readable session, with inactivity applied to active ones.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only if the session directory cannot be read.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<Session>, ArenaError> {
        let mut sessions = self.store.list_sessions()?;
        for session in sessions.iter_mut().filter(|s| s.is_active()) {
            match self.check_inactivity(&session.id) {
                Ok(fresh) => *session = fresh,
                Err(e) => warn!(session_id = %session.id, error = %e, "Inactivity check failed"),
            }
        }
        Ok(sessions)
    }

    /// Resolves a ticket to its live session.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed id or `NotFound` if the ticket or
    /// its session is unknown.
    #[instrument(skip(self))]
    pub fn session_for_ticket(&self, ticket_id: &str) -> Result<TicketView, ArenaError> {
        let ticket = self.store.load_ticket(ticket_id)?;
        let session = self.get_session(&ticket.session_id)?;
        let seated = session.seat_matches(ticket.side, &ticket.ticket_id);
        debug!(session_id = %session.id, side = %ticket.side, seated, "Ticket resolved");
        Ok(TicketView {
            ticket,
            session,
            seated,
        })
    }

    /// The active session, if any.
    ///
    /// The registry marker is tried first. When it is missing, corrupt, or
    /// names a session that has ended, every session record is scanned, so a
    /// lost marker never hides an active session.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the marker or the sessions directory cannot be
    /// read.
    #[instrument(skip(self))]
    pub fn active_session(&self) -> Result<Option<Session>, ArenaError> {
        if let Some(id) = self.registry.current()? {
            match self.get_session(&id) {
                Ok(session) if session.is_active() => return Ok(Some(session)),
                Ok(_) => debug!(session_id = %id, "Active marker names a finished session"),
                Err(e) if e.kind == crate::ErrorKind::NotFound => {
                    warn!(session_id = %id, "Active marker names a missing session");
                }
                Err(e) => return Err(e),
            }
        }

        let mut active = self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.is_active());
        let found = active.next();
        if let Some(extra) = active.next() {
            warn!(session_id = %extra.id, "More than one active session on disk");
        }
        Ok(found)
    }
}
