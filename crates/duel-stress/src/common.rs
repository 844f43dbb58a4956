use crate::events::{emit, EventGame, EventPeer, EventSummary, GameStatus};
use duel_protocol::{
    LocalBus, PeerId, Phase, ProtocolEvent, ProtocolRuntime, RuntimeChannels, RuntimeConfig,
    RuntimeHandle, Snapshot,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Bus capacity per game. Far above what one game publishes.
pub const BUS_CAPACITY: usize = 4096;

/// Settings shared by every scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub games: u32,
    pub seed: u64,
    pub drop_rate: f64,
    pub timeout: Duration,
    pub runtime: RuntimeConfig,
}

impl ScenarioConfig {
    /// Per-game, per-peer seed. Distinct for every (game, slot) pair.
    pub fn peer_seed(&self, game: u32, slot: u64) -> u64 {
        self.seed
            .wrapping_mul(31)
            .wrapping_add(u64::from(game) * 8 + slot)
    }
}

/// Elapsed seconds since `start`.
pub fn elapsed_s(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// Use the given seed or draw one.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Join the bus (lossy if configured) and spawn a runtime for `name`.
pub fn spawn_peer(
    bus: &LocalBus,
    name: &str,
    seed: u64,
    config: &ScenarioConfig,
) -> RuntimeChannels {
    let endpoint = bus.join_lossy(config.drop_rate, seed ^ 0x5eed);
    let runtime = RuntimeConfig {
        seed: Some(seed),
        ..config.runtime.clone()
    };
    ProtocolRuntime::spawn(PeerId::new(name), endpoint, runtime)
}

/// Spawn a background task that emits JSONL for every protocol event.
pub fn spawn_event_forwarder(
    game: u32,
    peer: &str,
    mut events: mpsc::Receiver<ProtocolEvent>,
    start: Instant,
) {
    let peer = peer.to_string();
    tokio::spawn(async move {
        while let Some(detail) = events.recv().await {
            emit(&EventPeer {
                event: "peer",
                game,
                peer: peer.clone(),
                detail,
                elapsed_s: elapsed_s(start),
            });
        }
    });
}

/// Poll until `handle` reports `phase`; `None` after `timeout`.
pub async fn wait_for_phase(
    handle: &RuntimeHandle,
    phase: Phase,
    timeout: Duration,
) -> anyhow::Result<Option<Snapshot>> {
    let deadline = Instant::now() + timeout;
    loop {
        let snapshot = handle.snapshot().await?;
        if snapshot.phase == phase {
            return Ok(Some(snapshot));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for both peers to finish and classify the game.
pub async fn settle_game(
    scenario: &'static str,
    game: u32,
    alice: &RuntimeHandle,
    bob: &RuntimeHandle,
    timeout: Duration,
    start: Instant,
) -> anyhow::Result<GameStatus> {
    let deadline = Instant::now() + timeout;
    let a = wait_for_phase(alice, Phase::IsOver, timeout).await?;
    let remaining = deadline.saturating_duration_since(Instant::now());
    let b = wait_for_phase(bob, Phase::IsOver, remaining).await?;

    let (status, a, b) = match (a, b) {
        (Some(a), Some(b)) if a.moves == b.moves => (GameStatus::Finished, a, b),
        (Some(a), Some(b)) => (GameStatus::Diverged, a, b),
        (a, b) => {
            let a = match a {
                Some(a) => a,
                None => alice.snapshot().await?,
            };
            let b = match b {
                Some(b) => b,
                None => bob.snapshot().await?,
            };
            (GameStatus::Stalled, a, b)
        }
    };

    emit(&EventGame {
        event: "game",
        scenario,
        game,
        status,
        alice_phase: a.phase,
        bob_phase: b.phase,
        moves: a.moves.len(),
        outcome: (status == GameStatus::Finished).then_some(a.outcome),
        elapsed_s: elapsed_s(start),
    });
    if status != GameStatus::Finished {
        tracing::warn!(game, ?status, "alice {:?} / bob {:?}", a.board, b.board);
    }
    Ok(status)
}

/// Tally of game results for one scenario.
#[derive(Debug, Default)]
pub struct Tally {
    pub finished: u32,
    pub stalled: u32,
    pub diverged: u32,
}

impl Tally {
    pub fn record(&mut self, status: GameStatus) {
        match status {
            GameStatus::Finished => self.finished += 1,
            GameStatus::Stalled => self.stalled += 1,
            GameStatus::Diverged => self.diverged += 1,
        }
    }

    /// Emit the JSONL summary and print the table to stderr.
    pub fn report(&self, scenario: &'static str, games: u32, start: Instant) {
        emit(&EventSummary {
            event: "summary",
            scenario,
            games,
            finished: self.finished,
            stalled: self.stalled,
            diverged: self.diverged,
            elapsed_s: elapsed_s(start),
        });

        eprintln!("\n╔══════════════════════════════════════════╗");
        eprintln!("║  {scenario:<8} summary                       ║");
        eprintln!("╠══════════════════════════════════════════╣");
        eprintln!("║  games     {games:>6}                        ║");
        eprintln!("║  finished  {:>6}                        ║", self.finished);
        eprintln!("║  stalled   {:>6}                        ║", self.stalled);
        eprintln!("║  diverged  {:>6}                        ║", self.diverged);
        eprintln!("╚══════════════════════════════════════════╝");
    }
}
