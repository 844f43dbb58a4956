use crate::output;
use duel_protocol::{Outcome, Phase, ProtocolEvent};
use serde::Serialize;
use std::io::Write;

/// Emit a JSONL event to stdout (flushed immediately for piped output).
/// If --output-dir was provided, also writes to the JSONL file.
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();

        output::write_jsonl_line(&json);
    }
}

// ── Run events ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStarted {
    pub event: &'static str,
    pub scenario: &'static str,
    pub games: u32,
    pub seed: u64,
    pub drop_rate: f64,
    pub timestamp: String,
}

impl EventStarted {
    pub fn new(scenario: &'static str, games: u32, seed: u64, drop_rate: f64) -> Self {
        Self {
            event: "started",
            scenario,
            games,
            seed,
            drop_rate,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// A protocol event observed on one peer.
#[derive(Serialize)]
pub struct EventPeer {
    pub event: &'static str,
    pub game: u32,
    pub peer: String,
    pub detail: ProtocolEvent,
    pub elapsed_s: f64,
}

// ── Crash scenario ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventCrash {
    pub event: &'static str,
    pub game: u32,
    pub peer: String,
    pub moves_seen: usize,
    pub elapsed_s: f64,
}

// ── Per-game result ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventGame {
    pub event: &'static str,
    pub scenario: &'static str,
    pub game: u32,
    pub status: GameStatus,
    pub alice_phase: Phase,
    pub bob_phase: Phase,
    pub moves: usize,
    pub outcome: Option<Outcome>,
    pub elapsed_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Both peers reached `IsOver` with identical logs.
    Finished,
    /// Timed out before both peers finished.
    Stalled,
    /// Both finished but disagree on the log.
    Diverged,
}

// ── Summary ─────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventSummary {
    pub event: &'static str,
    pub scenario: &'static str,
    pub games: u32,
    pub finished: u32,
    pub stalled: u32,
    pub diverged: u32,
    pub elapsed_s: f64,
}
