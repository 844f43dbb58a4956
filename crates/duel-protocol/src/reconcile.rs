//! Reconciliation of two divergent session views.
//!
//! Pure functions: the processor decides when to reconcile and applies the
//! resulting [`GameView`] to its session.

use crate::board::Board;
use crate::session::{GameView, Session};
use crate::types::{Move, MoveType, PeerId, Phase};

/// Longest initial run on which both logs agree entry by entry.
pub fn common_prefix(a: &[Move], b: &[Move]) -> Vec<Move> {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.clone())
        .collect()
}

/// `true` when the two roles are known and opposite.
pub fn are_complementary(own: Option<MoveType>, theirs: Option<MoveType>) -> bool {
    match (own, theirs) {
        (Some(own), Some(theirs)) => own == theirs.complement(),
        _ => false,
    }
}

/// Same phase, opposite roles, identical logs.
pub fn is_consistent(own: &GameView, theirs: &GameView) -> bool {
    own.phase == theirs.phase
        && are_complementary(own.move_type, theirs.move_type)
        && own.moves == theirs.moves
}

/// The earlier of two phases. `Inconsistent` defers to the other side.
pub fn earliest(a: Phase, b: Phase) -> Phase {
    match (a, b) {
        (Phase::Inconsistent, other) | (other, Phase::Inconsistent) => other,
        (a, b) if a <= b => a,
        (_, b) => b,
    }
}

/// Align a phase with what the kept log and the known role allow.
///
/// Once roles are settled the type negotiation has nothing left to decide,
/// so negotiation stages collapse to `InProgress`. A started game is
/// `IsOver` exactly when its board is over.
fn settle_phase(phase: Phase, move_type: Option<MoveType>, board: &Board) -> Phase {
    let started = match phase {
        Phase::OpponentFound | Phase::ChoosingMoveType | Phase::CheckingOpponentState => {
            move_type.is_some()
        }
        Phase::InProgress | Phase::IsOver | Phase::Inconsistent => true,
        Phase::Idle | Phase::SearchingForOpponent => false,
    };
    if !started {
        return phase;
    }
    if board.is_over() {
        Phase::IsOver
    } else {
        Phase::InProgress
    }
}

/// The view this peer adopts after comparing itself with `theirs`.
///
/// Kept history is the common prefix, the role is the complement of theirs,
/// the phase is the earlier of the two, settled against the kept history.
pub fn reconcile(own: &GameView, theirs: &GameView) -> GameView {
    let moves = common_prefix(&own.moves, &theirs.moves);
    let move_type = theirs.move_type.map(MoveType::complement);
    let board = Board::from_moves(&moves);
    let phase = settle_phase(earliest(own.phase, theirs.phase), move_type, &board);
    GameView {
        phase,
        move_type,
        moves,
    }
}

/// Wholesale adoption of an authoritative view (recovery of a restarted peer).
pub fn adopt(theirs: &GameView) -> GameView {
    GameView {
        phase: theirs.phase,
        move_type: theirs.move_type.map(MoveType::complement),
        moves: theirs.moves.clone(),
    }
}

/// What a peer does to get play moving again after recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    /// Our turn: request approval for a move.
    ProposeMove,
    /// Their turn: nudge them with `MakeMoveRequest`.
    AskOpponent,
    /// Not in play; nothing to resume.
    Wait,
}

/// Whose turn it is, from the session alone. Pure and repeatable.
pub fn resume_action(session: &Session, local_id: &PeerId) -> ResumeAction {
    if session.phase() != Phase::InProgress {
        return ResumeAction::Wait;
    }
    match session.last_move() {
        None if session.move_type() == Some(MoveType::First) => ResumeAction::ProposeMove,
        None => ResumeAction::AskOpponent,
        Some(last) if last.sender != *local_id => ResumeAction::ProposeMove,
        Some(_) => ResumeAction::AskOpponent,
    }
}
