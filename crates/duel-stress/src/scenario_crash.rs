//! `crash`: bob is killed after a few committed moves and replaced by a
//! fresh instance with the same id. Alice must push the game back to it.

use crate::common::{
    elapsed_s, settle_game, spawn_event_forwarder, spawn_peer, ScenarioConfig, Tally,
    BUS_CAPACITY,
};
use crate::events::{emit, EventCrash, EventPeer, EventStarted};
use duel_protocol::{LocalBus, ProtocolEvent};
use std::time::{Duration, Instant};

pub async fn run(
    config: ScenarioConfig,
    crash_after: usize,
    start: Instant,
) -> anyhow::Result<Tally> {
    emit(&EventStarted::new(
        "crash",
        config.games,
        config.seed,
        config.drop_rate,
    ));

    let mut tally = Tally::default();
    for game in 0..config.games {
        let bus = LocalBus::new(BUS_CAPACITY);
        let alice = spawn_peer(&bus, "alice", config.peer_seed(game, 0), &config);
        let mut bob = spawn_peer(&bus, "bob", config.peer_seed(game, 1), &config);
        spawn_event_forwarder(game, "alice", alice.events, start);

        // Watch bob directly so the crash lands mid-game.
        let mut moves_seen = 0;
        while moves_seen < crash_after {
            match tokio::time::timeout(config.timeout, bob.events.recv()).await {
                Ok(Some(detail)) => {
                    if matches!(detail, ProtocolEvent::MoveCommitted { .. }) {
                        moves_seen += 1;
                    }
                    emit(&EventPeer {
                        event: "peer",
                        game,
                        peer: "bob".to_string(),
                        detail,
                        elapsed_s: elapsed_s(start),
                    });
                }
                Ok(None) | Err(_) => break,
            }
        }

        bob.handle.shutdown().await;
        emit(&EventCrash {
            event: "crash",
            game,
            peer: "bob".to_string(),
            moves_seen,
            elapsed_s: elapsed_s(start),
        });
        // Let the old loop drop its bus endpoint.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let reborn = spawn_peer(&bus, "bob", config.peer_seed(game, 2), &config);
        spawn_event_forwarder(game, "bob", reborn.events, start);

        let status = settle_game(
            "crash",
            game,
            &alice.handle,
            &reborn.handle,
            config.timeout,
            start,
        )
        .await?;
        tally.record(status);

        alice.handle.shutdown().await;
        reborn.handle.shutdown().await;
    }

    tally.report("crash", config.games, start);
    Ok(tally)
}
