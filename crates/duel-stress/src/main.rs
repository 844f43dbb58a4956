mod common;
mod events;
mod output;
mod scenario_crash;
mod scenario_match;

use clap::{Parser, Subcommand};
use common::{resolve_seed, ScenarioConfig, Tally};
use duel_protocol::RuntimeConfig;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "duel-stress", about = "Play many duel games over an in-process bus")]
struct Cli {
    /// Also write JSONL events into this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Heartbeat interval in ms.
    #[arg(long, default_value = "200")]
    alive_ms: u64,

    /// Liveness check interval in ms.
    #[arg(long, default_value = "100")]
    liveness_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Two fresh peers per game, optionally over a lossy bus.
    Match {
        /// Number of games.
        #[arg(long, default_value = "10")]
        games: u32,
        /// Probability that a peer drops an incoming frame.
        #[arg(long, default_value = "0.0")]
        drop_rate: f64,
        /// RNG seed (random if omitted).
        #[arg(long)]
        seed: Option<u64>,
        /// Per-game timeout in ms.
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Kill and restart one peer mid-game.
    Crash {
        /// Number of games.
        #[arg(long, default_value = "10")]
        games: u32,
        /// RNG seed (random if omitted).
        #[arg(long)]
        seed: Option<u64>,
        /// Committed moves seen by the victim before it is killed.
        #[arg(long, default_value = "2")]
        crash_after: usize,
        /// Per-game timeout in ms.
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },
}

impl Command {
    fn scenario(&self) -> &'static str {
        match self {
            Command::Match { .. } => "match",
            Command::Crash { .. } => "crash",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    if let Some(dir) = &cli.output_dir {
        let path = output::resolve_jsonl_path(dir, cli.command.scenario())?;
        output::init_jsonl_writer(&path)?;
        eprintln!("JSONL: {}", path.display());
    }

    let runtime = RuntimeConfig {
        alive_interval: Duration::from_millis(cli.alive_ms),
        liveness_interval: Duration::from_millis(cli.liveness_ms),
        ..RuntimeConfig::default()
    };

    eprintln!("duel-stress v{}", env!("CARGO_PKG_VERSION"));

    let tally: Tally = match cli.command {
        Command::Match {
            games,
            drop_rate,
            seed,
            timeout_ms,
        } => {
            anyhow::ensure!(
                (0.0..1.0).contains(&drop_rate),
                "--drop-rate must be in [0, 1)"
            );
            let seed = resolve_seed(seed);
            eprintln!("Seed: {seed}\n");
            scenario_match::run(
                ScenarioConfig {
                    games,
                    seed,
                    drop_rate,
                    timeout: Duration::from_millis(timeout_ms),
                    runtime,
                },
                start,
            )
            .await?
        }

        Command::Crash {
            games,
            seed,
            crash_after,
            timeout_ms,
        } => {
            let seed = resolve_seed(seed);
            eprintln!("Seed: {seed}\n");
            scenario_crash::run(
                ScenarioConfig {
                    games,
                    seed,
                    drop_rate: 0.0,
                    timeout: Duration::from_millis(timeout_ms),
                    runtime,
                },
                crash_after,
                start,
            )
            .await?
        }
    };

    if tally.diverged > 0 {
        anyhow::bail!("{} game(s) diverged", tally.diverged);
    }
    Ok(())
}
