//! Strictly Arena - turn-based sessions shared by independent agent processes.
//!
//! Two agents, each in its own process, play one game by reading and writing
//! records in a shared data directory. Nothing else connects them.
//!
//! # Architecture
//!
//! - **Store**: session and ticket records as JSON files, repaired on read
//! - **Locks**: advisory locks from exclusive file creation, with a lease
//! - **Lifecycle**: session ids from a small pool, seat assignment, tickets
//! - **Turns**: move submission through the legality oracle, forfeits
//! - **Draws**: offer, accept, and the one-shot prompt gate
//! - **Waits**: polling loops with deadlines
//!
//! # Example
//!
//! ```no_run
//! use strictly_arena::{Arena, ArenaConfig, MoveNotes, PlayOutcome, Side};
//!
//! # fn example() -> Result<(), strictly_arena::ArenaError> {
//! let arena = Arena::with_chess(ArenaConfig::default())?;
//! let white = arena.join("alice", None)?;
//! let black = arena.join("bob", None)?;
//!
//! let mover = if white.side == Side::White { &white } else { &black };
//! match arena.play(&mover.ticket.ticket_id, "e2e4", &MoveNotes::new("Claim the centre".into()))? {
//!     PlayOutcome::Moved(receipt) => println!("ply {}", receipt.record.ply),
//!     PlayOutcome::DrawPending(_) => println!("draw offered"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod arena;
mod config;
mod draw;
mod error;
mod lifecycle;
mod lock;
mod model;
mod registry;
mod store;
mod turns;
mod wait;

pub use arena::{Arena, TicketView};
pub use config::{ArenaConfig, CONFIG_ENV, ConfigError, HOME_ENV};
pub use draw::{DrawGate, PlayOutcome};
pub use error::{ArenaError, ErrorKind};
pub use lifecycle::JoinReceipt;
pub use lock::{LockDir, LockGuard};
pub use model::{
    IllegalAttempt, MoveRecord, PendingDraw, Session, SessionStatus, SidePair, Ticket,
};
pub use store::RecordStore;
pub use turns::{MoveNotes, MoveReceipt};
pub use wait::{UnpairedSeat, WaitOutcome};

// Crate-level exports - oracle types that appear in arena signatures
pub use strictly_chess::{MoveOracle, Position, Side};
