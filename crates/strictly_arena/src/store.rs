//! File-backed record store for sessions and tickets.
//!
//! Layout under the data directory:
//!
//! ```text
//! sessions/<id>.json
//! tickets/<TICKET>.json
//! locks/<key>.lock
//! active.json
//! ```
//!
//! Writes go to a temporary sibling and are renamed into place. Reads repair
//! whatever a crashed or older writer may have left behind.

use crate::{ArenaError, Session, Ticket};
use chrono::Utc;
use rand::Rng;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use strictly_chess::Position;
use tracing::{debug, info, instrument, warn};

/// Loads and saves session and ticket records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    initial: Position,
}

impl RecordStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// `initial` fills in the starting position of records that lack one.
    ///
    /// # Errors
    ///
    /// Returns a storage [`ArenaError`] if the directories cannot be created.
    #[instrument(skip(root, initial), fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>, initial: Position) -> Result<Self, ArenaError> {
        let root = root.as_ref().to_path_buf();
        for dir in ["sessions", "tickets", "locks"] {
            fs::create_dir_all(root.join(dir))?;
        }
        info!(root = %root.display(), "Record store opened");
        Ok(Self { root, initial })
    }

    /// Root data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding lock entries.
    pub fn lock_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Path of the active-session marker.
    pub fn registry_path(&self) -> PathBuf {
        self.root.join("active.json")
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.root.join("sessions").join(format!("{}.json", id))
    }

    fn ticket_path(&self, ticket_id: &str) -> PathBuf {
        self.root
            .join("tickets")
            .join(format!("{}.json", ticket_id.to_ascii_uppercase()))
    }

    /// Loads a session by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists, `Validation` for a malformed id,
    /// or `Storage` if the record cannot be read or parsed.
    #[instrument(skip(self))]
    pub fn load_session(&self, id: &str) -> Result<Session, ArenaError> {
        validate_session_id(id)?;
        let path = self.session_path(id);
        let text = read_record(&path, || format!("Session '{}' not found", id))?;

        let mut session: Session = serde_json::from_str(&text)?;
        if session.id.is_empty() {
            debug!("Session record has no id, taking it from the file name");
            session.id = id.to_string();
        } else if session.id != id {
            warn!(stored = %session.id, expected = %id, "Session record names a different id");
            session.id = id.to_string();
        }
        session.normalize(&self.initial);
        debug!(revision = session.revision, status = %session.status, "Session loaded");
        Ok(session)
    }

    /// Whether a session record exists for `id`.
    pub fn session_exists(&self, id: &str) -> bool {
        validate_session_id(id).is_ok() && self.session_path(id).is_file()
    }

    /// Persists a session, bumping its revision and update time.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed id or `Storage` if the write fails.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn save_session(&self, session: &mut Session) -> Result<(), ArenaError> {
        validate_session_id(&session.id)?;
        session.normalize(&self.initial);
        session.revision += 1;
        session.updated_at = Utc::now();

        let text = serde_json::to_string_pretty(session)?;
        write_atomic(&self.session_path(&session.id), &text)?;
        debug!(revision = session.revision, "Session saved");
        Ok(())
    }

    /// Loads every readable session, skipping corrupt entries.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only if the sessions directory itself cannot be read.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<Session>, ArenaError> {
        let mut sessions = Vec::new();

        for entry in fs::read_dir(self.root.join("sessions"))? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load_session(id) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupt session record"),
            }
        }

        sessions.sort_by(|a, b| natural_order(&a.id, &b.id));
        debug!(count = sessions.len(), "Sessions listed");
        Ok(sessions)
    }

    /// Loads a ticket. Ids are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists, `Validation` for a malformed id,
    /// or `Storage` if the record cannot be read or parsed.
    #[instrument(skip(self))]
    pub fn load_ticket(&self, ticket_id: &str) -> Result<Ticket, ArenaError> {
        validate_ticket_id(ticket_id)?;
        let text = read_record(&self.ticket_path(ticket_id), || {
            format!("Ticket '{}' not found", ticket_id)
        })?;

        let mut ticket: Ticket = serde_json::from_str(&text)?;
        ticket.ticket_id = ticket.ticket_id.to_ascii_uppercase();
        if !ticket.ticket_id.eq_ignore_ascii_case(ticket_id) || ticket.session_id.is_empty() {
            return Err(ArenaError::storage(format!(
                "Ticket record '{}' is inconsistent",
                ticket_id
            )));
        }
        Ok(ticket)
    }

    /// Whether a ticket record exists.
    pub fn ticket_exists(&self, ticket_id: &str) -> bool {
        validate_ticket_id(ticket_id).is_ok() && self.ticket_path(ticket_id).is_file()
    }

    /// Persists a ticket after validating its ids.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the ticket or session id is malformed, or
    /// `Storage` if the write fails.
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.ticket_id, session_id = %ticket.session_id))]
    pub fn save_ticket(&self, ticket: &Ticket) -> Result<(), ArenaError> {
        validate_ticket_id(&ticket.ticket_id)?;
        validate_session_id(&ticket.session_id)?;

        let mut record = ticket.clone();
        record.ticket_id = record.ticket_id.to_ascii_uppercase();
        record.updated_at = Utc::now();

        let text = serde_json::to_string_pretty(&record)?;
        write_atomic(&self.ticket_path(&record.ticket_id), &text)?;
        debug!("Ticket saved");
        Ok(())
    }

    /// Deletes a ticket. Missing tickets are not an error.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if an existing record cannot be removed.
    #[instrument(skip(self))]
    pub fn delete_ticket(&self, ticket_id: &str) -> Result<(), ArenaError> {
        if validate_ticket_id(ticket_id).is_err() {
            return Ok(());
        }
        match fs::remove_file(self.ticket_path(ticket_id)) {
            Ok(()) => {
                debug!("Ticket deleted");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session ids name files, so they are limited to a safe alphabet.
pub(crate) fn validate_session_id(id: &str) -> Result<(), ArenaError> {
    let ok = !id.is_empty()
        && id.len() <= 32
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ArenaError::validation(format!("Invalid session id '{}'", id)))
    }
}

/// Ticket ids are ASCII letters only.
pub(crate) fn validate_ticket_id(ticket_id: &str) -> Result<(), ArenaError> {
    let ok = !ticket_id.is_empty()
        && ticket_id.len() <= 32
        && ticket_id.chars().all(|c| c.is_ascii_alphabetic());
    if ok {
        Ok(())
    } else {
        Err(ArenaError::validation(format!("Invalid ticket id '{}'", ticket_id)))
    }
}

fn read_record(path: &Path, missing: impl FnOnce() -> String) -> Result<String, ArenaError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Err(ArenaError::not_found(missing())),
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Err(ArenaError::storage(format!("Record {} is empty", path.display())));
    }
    Ok(text)
}

/// Writes `text` to a unique sibling and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, text: &str) -> Result<(), ArenaError> {
    let suffix: u32 = rand::thread_rng().r#gen();
    let tmp = path.with_extension(format!("tmp-{}-{:08x}", std::process::id(), suffix));

    fs::write(&tmp, text)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Numeric ids sort numerically, everything else lexically after them.
fn natural_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
