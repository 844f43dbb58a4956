/// Protocol runtime: runs one peer's protocol as a live event loop.
///
/// The runtime owns the transport endpoint and the `EventProcessor` (and
/// through it the `Session`). It exposes a channel-based API so the
/// application never touches raw frames or session internals.
mod effect;
mod executor;
mod r#loop;
pub mod processor;
pub mod transport;

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::board::Outcome;
use crate::error::DuelProtocolError;
use crate::health::MAX_MISSED_HEARTBEATS;
use crate::session::Snapshot;
use crate::types::{Move, MoveType, PeerId, Phase};

pub use effect::RuntimeEffect;
pub use processor::EventProcessor;
pub use transport::{BusEndpoint, LocalBus, Transport};

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for the protocol runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval between `AliveEvent` broadcasts.
    pub alive_interval: Duration,
    /// Length of one liveness window.
    pub liveness_interval: Duration,
    /// Silent liveness windows tolerated during play.
    pub max_missed_heartbeats: u32,
    /// Seed for move type draws and cell choice. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Capacity of the command channel (app → runtime).
    pub command_buffer: usize,
    /// Capacity of the event channel (runtime → app).
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            alive_interval: Duration::from_secs(2),
            liveness_interval: Duration::from_secs(1),
            max_missed_heartbeats: MAX_MISSED_HEARTBEATS,
            seed: None,
            command_buffer: 64,
            event_buffer: 256,
        }
    }
}

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the application sends to the runtime event loop.
pub enum RuntimeCommand {
    /// Drop the current game and search for an opponent again.
    Restart,
    /// The transport lost its connection to the bus.
    TransportLost,
    /// The transport is connected again.
    TransportRestored,
    /// Query: copy of the session.
    GetSnapshot { reply: oneshot::Sender<Snapshot> },
    /// Graceful shutdown.
    Shutdown,
}

// ── Events (runtime → app) ───────────────────────────────────────────

/// Protocol-level events the application may want to observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// The session moved to another phase.
    PhaseChanged { from: Phase, to: Phase },
    /// An opponent is now bound to the session.
    OpponentBound { opponent: PeerId },
    /// A move type was drawn and proposed.
    MoveTypeChosen { move_type: MoveType },
    /// A move entered the local log.
    MoveCommitted { mv: Move },
    /// The game reached a terminal board.
    GameOver { outcome: Outcome },
    /// A consistency check or recovery completed on this side.
    Reconciled {
        with: PeerId,
        consistent: bool,
        kept_moves: usize,
    },
    /// The opponent missed liveness windows.
    OpponentSuspected { misses: u32 },
    /// Runtime encountered a non-fatal error.
    Error { description: String },
}

// ── RuntimeHandle (app-facing API) ───────────────────────────────────

/// Handle to communicate with a running `ProtocolRuntime`.
///
/// Cheap to clone. All methods are channel sends.
#[derive(Clone)]
pub struct RuntimeHandle {
    cmd_tx: mpsc::Sender<RuntimeCommand>,
    local_id: PeerId,
}

impl RuntimeHandle {
    /// This peer's identity.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    async fn send(&self, cmd: RuntimeCommand) -> Result<(), DuelProtocolError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| DuelProtocolError::RuntimeShutdown)
    }

    /// Abandon the current game and broadcast a new `PlayRequest`.
    pub async fn restart(&self) -> Result<(), DuelProtocolError> {
        self.send(RuntimeCommand::Restart).await
    }

    /// Report that the transport lost its connection.
    pub async fn transport_lost(&self) -> Result<(), DuelProtocolError> {
        self.send(RuntimeCommand::TransportLost).await
    }

    /// Report that the transport is connected again.
    pub async fn transport_restored(&self) -> Result<(), DuelProtocolError> {
        self.send(RuntimeCommand::TransportRestored).await
    }

    /// Current session state.
    pub async fn snapshot(&self) -> Result<Snapshot, DuelProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.send(RuntimeCommand::GetSnapshot { reply: tx }).await?;
        rx.await.map_err(|_| DuelProtocolError::RuntimeShutdown)
    }

    /// Graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown).await;
    }
}

// ── RuntimeChannels ──────────────────────────────────────────────────

/// Channels returned to the application when the runtime starts.
pub struct RuntimeChannels {
    /// Handle to send commands to the runtime.
    pub handle: RuntimeHandle,
    /// Receive protocol-level events.
    pub events: mpsc::Receiver<ProtocolEvent>,
}

// ── ProtocolRuntime ──────────────────────────────────────────────────

/// The protocol runtime. Spawn it and talk to it through channels.
pub struct ProtocolRuntime;

impl ProtocolRuntime {
    /// Create and start the protocol runtime for `local_id`.
    ///
    /// Takes ownership of the transport endpoint and spawns the event loop
    /// as a tokio task. The peer broadcasts its `PlayRequest` immediately.
    pub fn spawn<T>(local_id: PeerId, transport: T, config: RuntimeConfig) -> RuntimeChannels
    where
        T: Transport + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>(config.command_buffer);
        let (event_tx, event_rx) = mpsc::channel::<ProtocolEvent>(config.event_buffer);

        let processor = EventProcessor::new(local_id.clone(), &config);
        tokio::spawn(r#loop::runtime_loop(
            transport, processor, config, cmd_rx, event_tx,
        ));

        RuntimeChannels {
            handle: RuntimeHandle { cmd_tx, local_id },
            events: event_rx,
        }
    }
}
