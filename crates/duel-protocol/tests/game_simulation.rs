/// Integration tests: full games between two `EventProcessor`s.
///
/// Pure in-memory simulation, no runtime and no transport. Every peer owns
/// an inbox that receives every published frame (its own included), and a
/// seeded scheduler picks which inbox delivers next. Inboxes are FIFO unless
/// the simulation reorders, in which case any queued frame may go first.
/// Replacing a peer clears its inbox, like a fresh subscriber on a
/// broadcast bus.
use std::collections::{HashSet, VecDeque};

use duel_protocol::{
    Coordinates, EventProcessor, Message, Move, MoveType, Outcome, PeerId, Phase, ProtocolEvent,
    RuntimeConfig, RuntimeEffect, Session,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_STEPS: usize = 20_000;

fn config(seed: u64) -> RuntimeConfig {
    RuntimeConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

struct Sim {
    peers: Vec<EventProcessor>,
    inboxes: Vec<VecDeque<Vec<u8>>>,
    events: Vec<(PeerId, ProtocolEvent)>,
    rng: StdRng,
    loss: f64,
    reorder: bool,
}

impl Sim {
    fn new(seed: u64) -> Self {
        Self {
            peers: vec![
                EventProcessor::new("alice".into(), &config(seed * 2 + 1)),
                EventProcessor::new("bob".into(), &config(seed * 2 + 2)),
            ],
            inboxes: vec![VecDeque::new(), VecDeque::new()],
            events: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            loss: 0.0,
            reorder: false,
        }
    }

    fn lossy(seed: u64, loss: f64) -> Self {
        Self {
            loss,
            ..Self::new(seed)
        }
    }

    fn reordered(seed: u64) -> Self {
        Self {
            reorder: true,
            ..Self::new(seed)
        }
    }

    fn apply(&mut self, peer: usize, effects: Vec<RuntimeEffect>) {
        for effect in effects {
            match effect {
                RuntimeEffect::Publish(msg) => {
                    let frame = msg.to_bytes().unwrap();
                    for inbox in self.inboxes.iter_mut() {
                        if self.loss > 0.0 && self.rng.random_bool(self.loss) {
                            continue;
                        }
                        inbox.push_back(frame.clone());
                    }
                }
                RuntimeEffect::Emit(event) => {
                    let id = self.peers[peer].local_id().clone();
                    self.events.push((id, event));
                }
            }
        }
    }

    fn start_all(&mut self) {
        for i in 0..self.peers.len() {
            let effects = self.peers[i].start();
            self.apply(i, effects);
        }
    }

    /// Deliver one frame. `false` once every inbox is empty.
    fn step(&mut self) -> bool {
        let ready: Vec<usize> = (0..self.inboxes.len())
            .filter(|&i| !self.inboxes[i].is_empty())
            .collect();
        if ready.is_empty() {
            return false;
        }
        let i = ready[self.rng.random_range(0..ready.len())];
        self.deliver(i);
        true
    }

    /// Hand peer `i` one frame from its inbox. Panics when it is empty.
    fn deliver(&mut self, i: usize) {
        let frame = if self.reorder {
            let at = self.rng.random_range(0..self.inboxes[i].len());
            self.inboxes[i].remove(at)
        } else {
            self.inboxes[i].pop_front()
        }
        .unwrap();
        let effects = self.peers[i].handle_incoming(&frame);
        self.apply(i, effects);
    }

    /// Deliver until quiet; returns the number of deliveries.
    fn run(&mut self) -> usize {
        let mut steps = 0;
        while steps < MAX_STEPS && self.step() {
            steps += 1;
        }
        steps
    }

    fn run_until(&mut self, mut done: impl FnMut(&Sim) -> bool) -> bool {
        for _ in 0..MAX_STEPS {
            if done(self) {
                return true;
            }
            if !self.step() {
                return done(self);
            }
        }
        false
    }

    /// Replace peer `i` by a fresh process with the same id.
    fn crash(&mut self, i: usize, seed: u64) {
        let id = self.peers[i].local_id().clone();
        self.peers[i] = EventProcessor::new(id, &config(seed));
        self.inboxes[i].clear();
        let effects = self.peers[i].start();
        self.apply(i, effects);
    }

    fn session(&self, i: usize) -> &Session {
        self.peers[i].session()
    }

    fn is_quiet(&self) -> bool {
        self.inboxes.iter().all(VecDeque::is_empty)
    }
}

fn assert_no_shared_cells(session: &Session) {
    let mut seen = HashSet::new();
    for mv in session.moves() {
        assert!(
            seen.insert(mv.coordinates),
            "cell {} committed twice",
            mv.coordinates
        );
    }
}

fn assert_finished_and_agreed(sim: &Sim) {
    let (a, b) = (sim.session(0), sim.session(1));
    assert_eq!(a.phase(), Phase::IsOver);
    assert_eq!(b.phase(), Phase::IsOver);
    assert_eq!(a.moves(), b.moves());
    assert!(a.board().is_over());
    assert_ne!(a.board().outcome(), Outcome::Undecided);
    assert_eq!(a.board().outcome(), b.board().outcome());
    assert_eq!(a.move_type().map(MoveType::complement), b.move_type());
    assert_eq!(a.opponent(), Some(&PeerId::new("bob")));
    assert_eq!(b.opponent(), Some(&PeerId::new("alice")));
    assert_no_shared_cells(a);
}

/// Both peers start at once and play to the end.
#[test]
fn two_peers_converge_on_a_finished_game() {
    for seed in 0..32 {
        let mut sim = Sim::new(seed);
        sim.start_all();
        let steps = sim.run();
        assert!(sim.is_quiet(), "seed {seed}: still busy after {steps} steps");
        assert_finished_and_agreed(&sim);

        // Moves alternate strictly, First opening.
        let moves = sim.session(0).moves();
        assert_eq!(moves[0].move_type, MoveType::First);
        for pair in moves.windows(2) {
            assert_ne!(pair[0].sender, pair[1].sender);
            assert_eq!(pair[0].move_type.complement(), pair[1].move_type);
        }
    }
}

/// One peer starts first; the other joins later and still negotiates.
#[test]
fn late_joiner_finds_waiting_peer() {
    for seed in 0..8 {
        let mut sim = Sim::new(seed);
        let effects = sim.peers[0].start();
        sim.apply(0, effects);
        // Nobody is listening yet except alice herself.
        sim.run();
        assert_eq!(sim.session(0).phase(), Phase::SearchingForOpponent);

        let effects = sim.peers[1].start();
        sim.apply(1, effects);
        sim.run();
        assert_finished_and_agreed(&sim);
    }
}

/// Both sides report the same committed moves as events.
#[test]
fn events_report_every_commit_and_the_outcome() {
    let mut sim = Sim::new(3);
    sim.start_all();
    sim.run();

    for name in ["alice", "bob"] {
        let id = PeerId::new(name);
        let committed = sim
            .events
            .iter()
            .filter(|(peer, e)| *peer == id && matches!(e, ProtocolEvent::MoveCommitted { .. }))
            .count();
        assert_eq!(committed, sim.session(0).moves().len(), "{name}");

        let outcome = sim.events.iter().find_map(|(peer, e)| match e {
            ProtocolEvent::GameOver { outcome } if *peer == id => Some(*outcome),
            _ => None,
        });
        assert_eq!(outcome, Some(sim.session(0).board().outcome()), "{name}");
    }
}

/// A peer restarted mid-game with the same id gets the game pushed back.
#[test]
fn restarted_peer_recovers_game_in_progress() {
    for seed in 0..16 {
        let mut sim = Sim::new(seed);
        sim.start_all();

        let reached = sim.run_until(|sim| {
            let bob = sim.session(1);
            bob.phase() == Phase::InProgress && bob.moves().len() >= 2 && !bob.board().is_over()
        });
        assert!(reached, "seed {seed}: game never reached two moves");

        sim.crash(1, 1_000 + seed);
        assert_eq!(sim.session(1).phase(), Phase::SearchingForOpponent);
        assert!(sim.session(1).moves().is_empty());

        sim.run();
        assert!(sim.is_quiet());
        assert_finished_and_agreed(&sim);
    }
}

/// A silent opponent drives the session into `Inconsistent`; the next frame
/// from the opponent brings it back through a consistency check.
#[test]
fn partition_heals_through_consistency_check() {
    for seed in 0..16 {
        let mut sim = Sim::new(seed);
        sim.start_all();

        let reached = sim.run_until(|sim| {
            (0..2).all(|i| {
                let s = sim.session(i);
                s.phase() == Phase::InProgress && !s.board().is_over()
            }) && !sim.session(0).moves().is_empty()
        });
        assert!(reached, "seed {seed}: game never got going");

        // Partition: everything in flight is lost, alice hears nothing.
        for inbox in sim.inboxes.iter_mut() {
            inbox.clear();
        }
        for _ in 0..4 {
            let effects = sim.peers[0].tick_liveness();
            sim.apply(0, effects);
        }
        assert_eq!(sim.session(0).phase(), Phase::Inconsistent);
        assert!(sim
            .events
            .iter()
            .any(|(_, e)| matches!(e, ProtocolEvent::OpponentSuspected { misses: 3 })));

        // Heal: bob's next heartbeat reaches alice.
        let effects = sim.peers[1].tick_alive();
        sim.apply(1, effects);
        sim.run();

        assert!(sim.is_quiet());
        assert_finished_and_agreed(&sim);
        assert!(sim
            .events
            .iter()
            .any(|(peer, e)| peer.as_str() == "alice"
                && matches!(e, ProtocolEvent::Reconciled { .. })));
    }
}

/// Any queued frame may overtake the others; without loss the game still
/// finishes with both sides agreeing.
#[test]
fn reordered_delivery_still_converges() {
    for seed in 0..32 {
        let mut sim = Sim::reordered(seed);
        sim.start_all();
        let steps = sim.run();
        assert!(sim.is_quiet(), "seed {seed}: still busy after {steps} steps");
        assert_finished_and_agreed(&sim);
    }
}

/// Bob accepts alice's request and asks for a role; alice reads the role
/// request before the acceptance and has to drop it.
#[test]
fn swapped_negotiation_replies_still_converge() {
    for seed in 0..16 {
        let mut sim = Sim::new(seed);
        let effects = sim.peers[1].start();
        sim.apply(1, effects);
        for inbox in sim.inboxes.iter_mut() {
            inbox.clear();
        }

        let effects = sim.peers[0].start();
        sim.apply(0, effects);
        // Only alice's play request is queued for bob.
        assert_eq!(sim.inboxes[1].len(), 1);
        sim.deliver(1);
        assert_eq!(sim.session(1).phase(), Phase::ChoosingMoveType);

        // Alice's inbox: her own request, bob's acceptance, bob's role request.
        assert_eq!(sim.inboxes[0].len(), 3);
        sim.inboxes[0].make_contiguous().reverse();
        sim.deliver(0);
        assert_eq!(sim.session(0).phase(), Phase::SearchingForOpponent);

        sim.run();
        assert!(sim.is_quiet(), "seed {seed}");
        assert_finished_and_agreed(&sim);
    }
}

/// Frames get lost; whatever state the peers end in, no cell is taken twice.
#[test]
fn lossy_bus_never_double_commits() {
    for seed in 0..32 {
        let mut sim = Sim::lossy(seed, 0.15);
        sim.start_all();
        sim.run();
        for i in 0..2 {
            assert_no_shared_cells(sim.session(i));
        }
    }
}

/// A third peer's traffic never disturbs a bound game.
#[test]
fn bystander_cannot_interfere() {
    let mut sim = Sim::new(5);
    sim.start_all();
    let reached = sim.run_until(|sim| sim.session(1).phase() == Phase::InProgress);
    assert!(reached);

    let mut carol = EventProcessor::new("carol".into(), &config(99));
    let effects = carol.start();
    for effect in effects {
        if let RuntimeEffect::Publish(msg) = effect {
            let frame = msg.to_bytes().unwrap();
            for inbox in sim.inboxes.iter_mut() {
                inbox.push_back(frame.clone());
            }
        }
    }
    let stray = [
        Message::MoveMade {
            sender: "carol".into(),
            move_type: MoveType::First,
            coordinates: Coordinates::new(1, 1),
        },
        Message::ConsistencyCheckRequest {
            sender: "carol".into(),
            phase: Phase::SearchingForOpponent,
            move_type: None,
            moves: vec![],
        },
        Message::RecoveryRequest {
            sender: "carol".into(),
            phase: Phase::InProgress,
            move_type: Some(MoveType::First),
            moves: vec![Move::new(
                "carol".into(),
                MoveType::First,
                Coordinates::new(2, 2),
            )],
        },
        Message::InstanceRecovered {
            sender: "carol".into(),
        },
        Message::GameStateProvided {
            sender: "carol".into(),
            phase: Phase::SearchingForOpponent,
            move_type: None,
            moves: vec![],
        },
    ];
    for msg in stray {
        let frame = msg.to_bytes().unwrap();
        for inbox in sim.inboxes.iter_mut() {
            inbox.push_back(frame.clone());
        }
    }

    sim.run();
    assert_finished_and_agreed(&sim);
    for i in 0..2 {
        assert!(sim
            .session(i)
            .moves()
            .iter()
            .all(|m| m.sender.as_str() != "carol"));
    }
}
