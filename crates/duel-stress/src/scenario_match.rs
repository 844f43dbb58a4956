//! `match`: two fresh peers on a (possibly lossy) bus play until both are over.

use crate::common::{
    elapsed_s, settle_game, spawn_event_forwarder, spawn_peer, ScenarioConfig, Tally,
    BUS_CAPACITY,
};
use crate::events::{emit, EventStarted};
use duel_protocol::LocalBus;
use std::time::Instant;

pub async fn run(config: ScenarioConfig, start: Instant) -> anyhow::Result<Tally> {
    emit(&EventStarted::new(
        "match",
        config.games,
        config.seed,
        config.drop_rate,
    ));

    let mut tally = Tally::default();
    for game in 0..config.games {
        let bus = LocalBus::new(BUS_CAPACITY);
        let alice = spawn_peer(&bus, "alice", config.peer_seed(game, 0), &config);
        let bob = spawn_peer(&bus, "bob", config.peer_seed(game, 1), &config);
        spawn_event_forwarder(game, "alice", alice.events, start);
        spawn_event_forwarder(game, "bob", bob.events, start);

        let status = settle_game(
            "match",
            game,
            &alice.handle,
            &bob.handle,
            config.timeout,
            start,
        )
        .await?;
        tally.record(status);

        alice.handle.shutdown().await;
        bob.handle.shutdown().await;
        tracing::debug!(game, ?status, elapsed_s = elapsed_s(start), "game done");
    }

    tally.report("match", config.games, start);
    Ok(tally)
}
