use crate::types::Coordinates;

/// Errors surfaced by the duel protocol layer.
///
/// Protocol-level disagreements (wrong phase, divergence, rejected moves)
/// are not errors: they are handled inside the state machine. These variants
/// cover encoding, local invariant violations and runtime plumbing.
#[derive(Debug, thiserror::Error)]
pub enum DuelProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("cell {coordinates} is already occupied")]
    CellOccupied { coordinates: Coordinates },

    #[error("cell {coordinates} is off the board")]
    OffBoard { coordinates: Coordinates },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("runtime shut down")]
    RuntimeShutdown,
}

impl From<rmp_serde::encode::Error> for DuelProtocolError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        DuelProtocolError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for DuelProtocolError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        DuelProtocolError::Deserialization(e.to_string())
    }
}
