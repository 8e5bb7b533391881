//! The marker naming the one active session.
//!
//! The marker is only written by session creation, which holds the registry
//! lock across the active-session check and the claim. Nothing removes it: a
//! marker naming a finished session simply reads as no active session, and
//! the session record stays authoritative.

use crate::store::write_atomic;
use crate::ArenaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

/// Lock key serialising registry updates.
pub(crate) const REGISTRY_LOCK: &str = "registry";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Marker {
    session_id: String,
    claimed_at: DateTime<Utc>,
}

/// Reads and writes the active-session marker.
#[derive(Debug, Clone)]
pub(crate) struct ActiveRegistry {
    path: PathBuf,
}

impl ActiveRegistry {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Session id the marker names, if any. A corrupt marker reads as none.
    #[instrument(skip(self))]
    pub(crate) fn current(&self) -> Result<Option<String>, ArenaError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Marker>(&text) {
            Ok(marker) => Ok(Some(marker.session_id)),
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt active-session marker");
                Ok(None)
            }
        }
    }

    /// Points the marker at `session_id`. Call with the registry lock held.
    #[instrument(skip(self))]
    pub(crate) fn claim(&self, session_id: &str) -> Result<(), ArenaError> {
        let marker = Marker {
            session_id: session_id.to_string(),
            claimed_at: Utc::now(),
        };
        write_atomic(&self.path, &serde_json::to_string(&marker)?)?;
        debug!("Active session marker claimed");
        Ok(())
    }
}
