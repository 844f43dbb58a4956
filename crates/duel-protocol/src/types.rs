use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Board side length (the board is `BOARD_SIZE` x `BOARD_SIZE`).
pub const BOARD_SIZE: u8 = 3;

/// Peer identity on the bus.
///
/// Opaque and stable for a process lifetime. A restarted process may reuse
/// the same id; its state is still brand new.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role held by a peer for one game. The two peers always hold opposite roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    /// Moves first (X).
    First,
    /// Moves second (O).
    Second,
}

impl MoveType {
    /// The role the opponent must hold.
    pub fn complement(self) -> Self {
        match self {
            MoveType::First => MoveType::Second,
            MoveType::Second => MoveType::First,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            MoveType::First => 'X',
            MoveType::Second => 'O',
        }
    }
}

/// Board cell key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: u8,
    pub y: u8,
}

impl Coordinates {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn is_on_board(&self) -> bool {
        self.x < BOARD_SIZE && self.y < BOARD_SIZE
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A committed move. Equality is structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub sender: PeerId,
    pub move_type: MoveType,
    pub coordinates: Coordinates,
}

impl Move {
    pub fn new(sender: PeerId, move_type: MoveType, coordinates: Coordinates) -> Self {
        Self {
            sender,
            move_type,
            coordinates,
        }
    }
}

/// Peer-local belief about the stage of negotiation or play.
///
/// The linear stages are totally ordered (declaration order). `Inconsistent`
/// sits outside that order: it compares equal to itself and is incomparable
/// with every other phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    SearchingForOpponent,
    OpponentFound,
    ChoosingMoveType,
    CheckingOpponentState,
    InProgress,
    IsOver,
    Inconsistent,
}

impl Phase {
    /// Position in the linear order, `None` for `Inconsistent`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Phase::Idle => Some(0),
            Phase::SearchingForOpponent => Some(1),
            Phase::OpponentFound => Some(2),
            Phase::ChoosingMoveType => Some(3),
            Phase::CheckingOpponentState => Some(4),
            Phase::InProgress => Some(5),
            Phase::IsOver => Some(6),
            Phase::Inconsistent => None,
        }
    }

    /// `true` before play has started (negotiation stages).
    pub fn is_before_play(self) -> bool {
        self < Phase::InProgress
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
