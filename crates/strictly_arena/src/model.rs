//! Session and ticket records.

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use strictly_chess::{Position, Side, TerminalKind};
use strum::Display;

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn white() -> Side {
    Side::White
}

/// Lifecycle status of a session. Anything other than `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionStatus {
    /// Moves are being accepted.
    #[default]
    Active,
    /// The side to move was mated.
    Checkmate,
    /// The side to move had no legal move.
    Stalemate,
    /// Neither side could mate.
    DrawInsufficientMaterial,
    /// Threefold repetition.
    DrawRepetition,
    /// Fifty moves without progress.
    DrawFiftyMove,
    /// Nobody moved for too long.
    DrawInactivityTimeout,
    /// Both agents agreed to a draw.
    #[serde(rename = "draw")]
    #[strum(serialize = "draw")]
    DrawAgreement,
    /// One agent exhausted its illegal-move allowance.
    ForfeitIllegalMoves,
}

impl SessionStatus {
    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        self != Self::Active
    }

    /// Whether this ending names a winner.
    pub fn is_decisive(self) -> bool {
        matches!(self, Self::Checkmate | Self::ForfeitIllegalMoves)
    }
}

impl From<TerminalKind> for SessionStatus {
    fn from(kind: TerminalKind) -> Self {
        match kind {
            TerminalKind::Checkmate => Self::Checkmate,
            TerminalKind::Stalemate => Self::Stalemate,
            TerminalKind::InsufficientMaterial => Self::DrawInsufficientMaterial,
            TerminalKind::Repetition => Self::DrawRepetition,
            TerminalKind::FiftyMove => Self::DrawFiftyMove,
        }
    }
}

/// One value per side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidePair<T> {
    /// White's value.
    #[serde(default)]
    pub white: Option<T>,
    /// Black's value.
    #[serde(default)]
    pub black: Option<T>,
}

impl<T> SidePair<T> {
    /// Returns the value for `side`.
    pub fn get(&self, side: Side) -> Option<&T> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    /// Replaces the value for `side`, returning the previous one.
    pub fn set(&mut self, side: Side, value: Option<T>) -> Option<T> {
        match side {
            Side::White => std::mem::replace(&mut self.white, value),
            Side::Black => std::mem::replace(&mut self.black, value),
        }
    }

    /// Whether `side` has a value.
    pub fn is_set(&self, side: Side) -> bool {
        self.get(side).is_some()
    }

    /// Sides that have no value, white first.
    pub fn vacant(&self) -> Vec<Side> {
        [Side::White, Side::Black]
            .into_iter()
            .filter(|side| !self.is_set(*side))
            .collect()
    }
}

impl SidePair<String> {
    /// The side whose value equals `value`, ignoring ASCII case.
    pub fn side_of(&self, value: &str) -> Option<Side> {
        [Side::White, Side::Black]
            .into_iter()
            .find(|side| self.get(*side).is_some_and(|v| v.eq_ignore_ascii_case(value)))
    }
}

/// An applied move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 1-based position in the history.
    pub ply: u32,
    /// Side that moved.
    pub side: Side,
    /// Ticket that submitted the move.
    pub ticket: String,
    /// Canonical notation reported by the oracle.
    pub notation: String,
    /// The text the agent submitted.
    #[serde(default)]
    pub input: String,
    /// Position the move was played from.
    pub position_before: Position,
    /// Position the move produced.
    pub position_after: Position,
    /// The mover's stated reason for the move.
    #[serde(default)]
    pub rationale: String,
    /// Think time for display, e.g. `"12.4s"`.
    #[serde(default)]
    pub think_time: String,
    /// Milliseconds between the turn starting and the move landing.
    #[serde(default)]
    pub turn_duration_ms: u64,
    /// When the move was applied.
    #[serde(default = "now")]
    pub played_at: DateTime<Utc>,
}

/// A rejected submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllegalAttempt {
    /// Ticket that submitted it.
    pub ticket: String,
    /// Side the ticket claimed, if it resolved to one.
    #[serde(default)]
    pub side: Option<Side>,
    /// Raw move text.
    #[serde(default)]
    pub input: String,
    /// Why it was rejected.
    #[serde(default)]
    pub reason: String,
    /// Side to move at the time.
    #[serde(default = "white")]
    pub turn: Side,
    /// Session status at the time.
    #[serde(default)]
    pub status: SessionStatus,
    /// Number of applied moves at the time.
    #[serde(default)]
    pub ply: u32,
    /// Position at the time.
    #[serde(default)]
    pub position: Position,
    /// When it was rejected.
    #[serde(default = "now")]
    pub attempted_at: DateTime<Utc>,
}

/// An outstanding draw offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct PendingDraw {
    /// Side that offered.
    pub side: Side,
    /// Ticket that offered.
    pub ticket: String,
    /// When the offer was made.
    #[new(value = "Utc::now()")]
    #[serde(default = "now")]
    pub offered_at: DateTime<Utc>,
    /// Ticket that has already been shown the decision prompt.
    #[new(default)]
    #[serde(default)]
    pub shown_to: Option<String>,
}

/// Authoritative state of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short id from the session pool. The store fills it from the record's
    /// file name.
    #[serde(default)]
    pub id: String,
    /// Bumped on every save.
    #[serde(default)]
    pub revision: u64,
    /// Ticket occupying each seat.
    #[serde(default)]
    pub seats: SidePair<String>,
    /// Display identity of each seat's agent.
    #[serde(default)]
    pub seat_agents: SidePair<String>,
    /// Side to move.
    #[serde(default = "white")]
    pub turn: Side,
    /// Lifecycle status.
    #[serde(default)]
    pub status: SessionStatus,
    /// Winner of a decisive ending.
    #[serde(default)]
    pub winner: Option<Side>,
    /// When the session was created.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
    /// When the side to move started thinking.
    #[serde(default = "now")]
    pub turn_started_at: DateTime<Utc>,
    /// Applied moves, in order.
    #[serde(default)]
    pub history: Vec<MoveRecord>,
    /// Rejected submissions, in order.
    #[serde(default)]
    pub illegal_attempts: Vec<IllegalAttempt>,
    /// Initial position followed by the position after each move.
    #[serde(default)]
    pub positions: Vec<Position>,
    /// Outstanding draw offer.
    #[serde(default)]
    pub pending_draw: Option<PendingDraw>,
}

impl Session {
    /// Creates an empty active session starting from `initial`.
    pub fn new(id: impl Into<String>, initial: Position) -> Self {
        let at = Utc::now();
        Self {
            id: id.into(),
            revision: 0,
            seats: SidePair::default(),
            seat_agents: SidePair::default(),
            turn: Side::White,
            status: SessionStatus::Active,
            winner: None,
            created_at: at,
            updated_at: at,
            turn_started_at: at,
            history: Vec::new(),
            illegal_attempts: Vec::new(),
            positions: vec![initial],
            pending_draw: None,
        }
    }

    /// Whether moves are still accepted.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Whether both seats are occupied.
    pub fn is_full(&self) -> bool {
        self.seats.vacant().is_empty()
    }

    /// Position the next move is played from.
    pub fn current_position(&self) -> Option<&Position> {
        self.positions.last()
    }

    /// Number of applied moves.
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    /// Most recent moment anybody made progress: the last move, or creation
    /// when no move has been played.
    pub fn last_activity(&self) -> DateTime<Utc> {
        match self.history.last() {
            Some(last) => last.played_at,
            None => self.created_at,
        }
    }

    /// Whether `ticket` currently holds the seat for `side`.
    pub fn seat_matches(&self, side: Side, ticket: &str) -> bool {
        self.seats.get(side).is_some_and(|t| t.eq_ignore_ascii_case(ticket))
    }

    /// Ends the session. The winner is kept only for decisive statuses.
    pub fn finish(&mut self, status: SessionStatus, winner: Option<Side>) {
        self.status = status;
        self.winner = if status.is_decisive() { winner } else { None };
        self.pending_draw = None;
    }

    /// Repairs records that were written partially or by an older format.
    ///
    /// Restores `positions.len() == history.len() + 1`, drops a winner from
    /// non-decisive statuses and upper-cases seat tickets.
    pub fn normalize(&mut self, initial: &Position) {
        if self.positions.is_empty() {
            let first = self
                .history
                .first()
                .map(|m| m.position_before.clone())
                .unwrap_or_else(|| initial.clone());
            self.positions.push(first);
        }

        let wanted = self.history.len() + 1;
        if self.positions.len() > wanted {
            self.positions.truncate(wanted);
        }
        while self.positions.len() < wanted {
            let next = self.history[self.positions.len() - 1].position_after.clone();
            self.positions.push(next);
        }

        if !self.status.is_decisive() {
            self.winner = None;
        }
        if self.status.is_terminal() {
            self.pending_draw = None;
        }

        for side in [Side::White, Side::Black] {
            if let Some(ticket) = self.seats.get(side).map(|t| t.to_ascii_uppercase()) {
                self.seats.set(side, Some(ticket));
            }
        }
    }
}

/// A capability binding one agent to one seat of one session.
///
/// The session is authoritative: a ticket is only usable while the session's
/// seat for [`Ticket::side`] still names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Upper-case letters, unique among stored tickets.
    pub ticket_id: String,
    /// Session the seat belongs to.
    pub session_id: String,
    /// Display identity of the holder.
    #[serde(default)]
    pub agent: String,
    /// Seat the ticket claims.
    pub side: Side,
    /// When the ticket was issued.
    #[serde(default = "now")]
    pub issued_at: DateTime<Utc>,
    /// When the ticket was last written.
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Issues a ticket for `side` of `session_id`.
    pub fn new(
        ticket_id: impl Into<String>,
        session_id: impl Into<String>,
        agent: impl Into<String>,
        side: Side,
    ) -> Self {
        let at = Utc::now();
        Self {
            ticket_id: ticket_id.into().to_ascii_uppercase(),
            session_id: session_id.into(),
            agent: agent.into(),
            side,
            issued_at: at,
            updated_at: at,
        }
    }
}
