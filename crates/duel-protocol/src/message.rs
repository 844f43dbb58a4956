//! Wire messages.
//!
//! One enum variant per message kind. Encoded as MessagePack with named
//! fields, so every frame is a self-describing record.

use serde::{Deserialize, Serialize};

use crate::error::DuelProtocolError;
use crate::session::GameView;
use crate::types::{Coordinates, Move, MoveType, PeerId, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    PlayRequest {
        sender: PeerId,
    },
    PlayRequestAccepted {
        sender: PeerId,
    },
    MoveTypeApprovalRequest {
        sender: PeerId,
        move_type: MoveType,
    },
    MoveTypeApproved {
        sender: PeerId,
        move_type: MoveType,
    },
    MoveTypeRejected {
        sender: PeerId,
        move_type: MoveType,
    },
    MoveApprovalRequest {
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    },
    MoveApproved {
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    },
    MoveRejected {
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    },
    MoveMade {
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    },
    GameIsOver {
        sender: PeerId,
    },
    GameStateRequest {
        sender: PeerId,
    },
    GameStateProvided {
        sender: PeerId,
        phase: Phase,
        move_type: Option<MoveType>,
        moves: Vec<Move>,
    },
    RecoveryRequest {
        sender: PeerId,
        phase: Phase,
        move_type: Option<MoveType>,
        moves: Vec<Move>,
    },
    InstanceRecovered {
        sender: PeerId,
    },
    ConsistencyCheckRequest {
        sender: PeerId,
        phase: Phase,
        move_type: Option<MoveType>,
        moves: Vec<Move>,
    },
    ConsistencyCheckResponse {
        sender: PeerId,
        phase: Phase,
        move_type: Option<MoveType>,
        moves: Vec<Move>,
        consistent: bool,
    },
    MakeMoveRequest {
        sender: PeerId,
    },
    AliveEvent {
        sender: PeerId,
    },
}

impl Message {
    pub fn sender(&self) -> &PeerId {
        match self {
            Message::PlayRequest { sender }
            | Message::PlayRequestAccepted { sender }
            | Message::MoveTypeApprovalRequest { sender, .. }
            | Message::MoveTypeApproved { sender, .. }
            | Message::MoveTypeRejected { sender, .. }
            | Message::MoveApprovalRequest { sender, .. }
            | Message::MoveApproved { sender, .. }
            | Message::MoveRejected { sender, .. }
            | Message::MoveMade { sender, .. }
            | Message::GameIsOver { sender }
            | Message::GameStateRequest { sender }
            | Message::GameStateProvided { sender, .. }
            | Message::RecoveryRequest { sender, .. }
            | Message::InstanceRecovered { sender }
            | Message::ConsistencyCheckRequest { sender, .. }
            | Message::ConsistencyCheckResponse { sender, .. }
            | Message::MakeMoveRequest { sender }
            | Message::AliveEvent { sender } => sender,
        }
    }

    /// Variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PlayRequest { .. } => "PlayRequest",
            Message::PlayRequestAccepted { .. } => "PlayRequestAccepted",
            Message::MoveTypeApprovalRequest { .. } => "MoveTypeApprovalRequest",
            Message::MoveTypeApproved { .. } => "MoveTypeApproved",
            Message::MoveTypeRejected { .. } => "MoveTypeRejected",
            Message::MoveApprovalRequest { .. } => "MoveApprovalRequest",
            Message::MoveApproved { .. } => "MoveApproved",
            Message::MoveRejected { .. } => "MoveRejected",
            Message::MoveMade { .. } => "MoveMade",
            Message::GameIsOver { .. } => "GameIsOver",
            Message::GameStateRequest { .. } => "GameStateRequest",
            Message::GameStateProvided { .. } => "GameStateProvided",
            Message::RecoveryRequest { .. } => "RecoveryRequest",
            Message::InstanceRecovered { .. } => "InstanceRecovered",
            Message::ConsistencyCheckRequest { .. } => "ConsistencyCheckRequest",
            Message::ConsistencyCheckResponse { .. } => "ConsistencyCheckResponse",
            Message::MakeMoveRequest { .. } => "MakeMoveRequest",
            Message::AliveEvent { .. } => "AliveEvent",
        }
    }

    /// Messages that belong to a reconciliation handshake already in flight.
    pub fn is_reconciliation(&self) -> bool {
        matches!(
            self,
            Message::ConsistencyCheckRequest { .. }
                | Message::ConsistencyCheckResponse { .. }
                | Message::RecoveryRequest { .. }
                | Message::InstanceRecovered { .. }
                | Message::GameStateRequest { .. }
                | Message::GameStateProvided { .. }
        )
    }

    pub fn consistency_check(sender: PeerId, view: GameView) -> Self {
        Message::ConsistencyCheckRequest {
            sender,
            phase: view.phase,
            move_type: view.move_type,
            moves: view.moves,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DuelProtocolError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DuelProtocolError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}
