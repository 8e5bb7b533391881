//! Arena configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "STRICTLY_ARENA_CONFIG";

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "STRICTLY_ARENA_HOME";

/// Tunables for the arena. Every field has a default, so an empty TOML file
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ArenaConfig {
    /// Directory holding session, ticket and lock files.
    #[serde(default = "default_data_dir")]
    #[setters(into)]
    data_dir: PathBuf,

    /// Session ids are `"1"` through this number.
    #[serde(default = "default_session_pool_size")]
    session_pool_size: u32,

    /// Sleep between re-reads in the wait loops.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Deadline for waiting on an opponent's move.
    #[serde(default = "default_move_wait_secs")]
    move_wait_secs: u64,

    /// Total time to keep retrying a held lock.
    #[serde(default = "default_lock_timeout_ms")]
    lock_timeout_ms: u64,

    /// Sleep between lock attempts.
    #[serde(default = "default_lock_retry_ms")]
    lock_retry_ms: u64,

    /// Age after which a lock entry is presumed abandoned by a crashed holder.
    #[serde(default = "default_lock_stale_secs")]
    lock_stale_secs: u64,

    /// Idle time after which an active session is drawn.
    #[serde(default = "default_inactivity_secs")]
    inactivity_secs: u64,

    /// Consecutive illegal attempts by one ticket that forfeit the game.
    #[serde(default = "default_illegal_streak_limit")]
    illegal_streak_limit: usize,

    /// Length of minted ticket ids.
    #[serde(default = "default_ticket_length")]
    ticket_length: usize,

    /// Collision retries when minting a ticket id.
    #[serde(default = "default_ticket_attempts")]
    ticket_attempts: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".strictly_arena")
}

fn default_session_pool_size() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_move_wait_secs() -> u64 {
    120
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_lock_retry_ms() -> u64 {
    50
}

fn default_lock_stale_secs() -> u64 {
    60
}

fn default_inactivity_secs() -> u64 {
    300
}

fn default_illegal_streak_limit() -> usize {
    5
}

fn default_ticket_length() -> usize {
    6
}

fn default_ticket_attempts() -> u32 {
    32
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            session_pool_size: default_session_pool_size(),
            poll_interval_ms: default_poll_interval_ms(),
            move_wait_secs: default_move_wait_secs(),
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_retry_ms: default_lock_retry_ms(),
            lock_stale_secs: default_lock_stale_secs(),
            inactivity_secs: default_inactivity_secs(),
            illegal_streak_limit: default_illegal_streak_limit(),
            ticket_length: default_ticket_length(),
            ticket_attempts: default_ticket_attempts(),
        }
    }
}

impl ArenaConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(data_dir = %config.data_dir.display(), "Config loaded successfully");
        Ok(config)
    }

    /// Resolves the effective configuration.
    ///
    /// Resolution order:
    /// 1. `explicit` path, if given
    /// 2. `$STRICTLY_ARENA_CONFIG`
    /// 3. built-in defaults
    ///
    /// `$STRICTLY_ARENA_HOME` then overrides the data directory.
    #[instrument]
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };

        if let Ok(home) = std::env::var(HOME_ENV) {
            debug!(home = %home, "Using STRICTLY_ARENA_HOME env var");
            config.data_dir = PathBuf::from(home);
        }

        Ok(config)
    }

    /// Rejects settings that would make waits or ticket minting impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_pool_size == 0 {
            return Err(ConfigError::new("session_pool_size must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 || self.lock_retry_ms == 0 {
            return Err(ConfigError::new("Poll and retry intervals must be non-zero".to_string()));
        }
        if self.ticket_length < 4 || self.ticket_attempts == 0 {
            return Err(ConfigError::new(
                "Tickets need at least 4 letters and one mint attempt".to_string(),
            ));
        }
        if self.illegal_streak_limit == 0 {
            return Err(ConfigError::new("illegal_streak_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Sleep between wait-loop polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Deadline for move waits.
    pub fn move_wait(&self) -> Duration {
        Duration::from_secs(self.move_wait_secs)
    }

    /// Total lock acquisition budget.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Sleep between lock attempts.
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }

    /// Lease after which a lock entry may be reclaimed.
    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    /// Idle time that draws an active session.
    pub fn inactivity_limit(&self) -> Duration {
        Duration::from_secs(self.inactivity_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = ArenaConfig::from_file(file.path()).unwrap();
        assert_eq!(config, ArenaConfig::default());
        assert_eq!(config.inactivity_limit(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_overrides() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "data_dir = \"/tmp/arena\"\nsession_pool_size = 3\n").unwrap();

        let config = ArenaConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_dir(), &PathBuf::from("/tmp/arena"));
        assert_eq!(*config.session_pool_size(), 3);
        assert_eq!(*config.illegal_streak_limit(), 5);
    }

    #[test]
    fn test_zero_pool_rejected() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "session_pool_size = 0\n").unwrap();
        assert!(ArenaConfig::from_file(file.path()).is_err());
    }
}
