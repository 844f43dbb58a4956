//! Session: this peer's single mutable belief about the shared game.
//!
//! Owned by exactly one runtime task; the processor is its only writer.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Outcome};
use crate::error::DuelProtocolError;
use crate::types::{Coordinates, Move, MoveType, PeerId, Phase};

/// The `(phase, move_type, moves)` triple peers exchange to compare state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub phase: Phase,
    pub move_type: Option<MoveType>,
    pub moves: Vec<Move>,
}

/// Point-in-time copy of a session, for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub local_id: PeerId,
    pub phase: Phase,
    pub previous_phase: Phase,
    pub opponent: Option<PeerId>,
    pub move_type: Option<MoveType>,
    pub moves: Vec<Move>,
    pub board: Vec<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct Session {
    phase: Phase,
    previous_phase: Phase,
    opponent: Option<PeerId>,
    move_type: Option<MoveType>,
    moves: Vec<Move>,
    board: Board,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            previous_phase: Phase::Idle,
            opponent: None,
            move_type: None,
            moves: Vec::new(),
            board: Board::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn previous_phase(&self) -> Phase {
        self.previous_phase
    }

    pub fn opponent(&self) -> Option<&PeerId> {
        self.opponent.as_ref()
    }

    pub fn move_type(&self) -> Option<MoveType> {
        self.move_type
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn last_move(&self) -> Option<&Move> {
        self.moves.last()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn is_opponent(&self, peer: &PeerId) -> bool {
        self.opponent.as_ref() == Some(peer)
    }

    /// Assign a phase, remembering the old one for [`rollback_phase`](Self::rollback_phase).
    pub fn set_phase(&mut self, phase: Phase) {
        self.previous_phase = self.phase;
        self.phase = phase;
    }

    /// One-step undo of the last phase assignment.
    pub fn rollback_phase(&mut self) {
        self.phase = self.previous_phase;
    }

    pub fn bind_opponent(&mut self, opponent: PeerId) {
        self.opponent = Some(opponent);
    }

    pub fn set_move_type(&mut self, move_type: MoveType) {
        self.move_type = Some(move_type);
    }

    pub fn is_free(&self, at: Coordinates) -> bool {
        self.board.is_free(at)
    }

    /// Append a committed move. Refuses a second move on an occupied cell.
    pub fn record_move(&mut self, mv: Move) -> Result<(), DuelProtocolError> {
        self.board.place(mv.move_type, mv.coordinates)?;
        self.moves.push(mv);
        Ok(())
    }

    /// Back to a fresh search: no opponent, empty log and board.
    pub fn restart(&mut self) {
        self.board = Board::new();
        self.opponent = None;
        self.moves.clear();
        self.set_phase(Phase::SearchingForOpponent);
    }

    /// Replace the whole session with a reconciled view bound to `opponent`.
    ///
    /// The board is replayed from `view.moves`; entries that would break
    /// cell uniqueness are dropped together with everything after them.
    pub fn accept_view(&mut self, opponent: PeerId, view: GameView) {
        self.restart();
        self.opponent = Some(opponent);
        self.set_phase(view.phase);
        self.move_type = view.move_type;
        for mv in view.moves {
            if let Err(e) = self.record_move(mv) {
                tracing::warn!("accepted view truncated: {e}");
                break;
            }
        }
    }

    pub fn view(&self) -> GameView {
        GameView {
            phase: self.phase,
            move_type: self.move_type,
            moves: self.moves.clone(),
        }
    }

    pub fn snapshot(&self, local_id: &PeerId) -> Snapshot {
        Snapshot {
            local_id: local_id.clone(),
            phase: self.phase,
            previous_phase: self.previous_phase,
            opponent: self.opponent.clone(),
            move_type: self.move_type,
            moves: self.moves.clone(),
            board: self.board.render(),
            outcome: self.board.outcome(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
