//! Duel protocol layer.
//!
//! Two peers on a broadcast bus find each other, agree on who moves first,
//! commit tic-tac-toe moves with a two-phase handshake, and reconcile
//! their state after crashes, restarts or lost messages.
//!
//! Wire format: MessagePack (named fields).

pub mod board;
pub mod error;
pub mod health;
pub mod message;
pub mod reconcile;
pub mod runtime;
pub mod session;
pub mod types;
pub mod validator;

pub use board::{Board, Outcome};
pub use error::DuelProtocolError;
pub use health::{HealthCheck, Liveness, MAX_MISSED_HEARTBEATS};
pub use message::Message;
pub use reconcile::{ResumeAction, common_prefix, reconcile, resume_action};
pub use runtime::{
    BusEndpoint, EventProcessor, LocalBus, ProtocolEvent, ProtocolRuntime, RuntimeChannels,
    RuntimeConfig, RuntimeEffect, RuntimeHandle, Transport,
};
pub use session::{GameView, Session, Snapshot};
pub use types::{Coordinates, Move, MoveType, PeerId, Phase, BOARD_SIZE};
pub use validator::Validator;
