//! EventProcessor: the per-peer protocol state machine.
//!
//! Pure logic, no I/O: every entry point takes the current input (decoded
//! message, tick, command) and returns the effects the event loop must
//! carry out. The processor is the only writer of its [`Session`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::health::{HealthCheck, Liveness};
use crate::message::Message;
use crate::reconcile::{self, ResumeAction};
use crate::session::{GameView, Session, Snapshot};
use crate::types::{Coordinates, Move, MoveType, PeerId, Phase};
use crate::validator::Validator;

use super::effect::RuntimeEffect;
use super::{ProtocolEvent, RuntimeCommand, RuntimeConfig};

pub struct EventProcessor {
    local_id: PeerId,
    session: Session,
    validator: Validator,
    health: HealthCheck,
    rng: StdRng,
    /// Cell of our outstanding `MoveApprovalRequest`, if any.
    pending: Option<Coordinates>,
}

impl EventProcessor {
    pub fn new(local_id: PeerId, config: &RuntimeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            validator: Validator::new(local_id.clone()),
            local_id,
            session: Session::new(),
            health: HealthCheck::with_threshold(config.max_missed_heartbeats),
            rng,
            pending: None,
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    /// Cell of the move we asked the opponent to approve.
    pub fn pending_proposal(&self) -> Option<Coordinates> {
        self.pending
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot(&self.local_id)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Leave `Idle` and look for an opponent.
    pub fn start(&mut self) -> Vec<RuntimeEffect> {
        self.observed(|p| {
            if p.session.phase() != Phase::Idle {
                tracing::debug!(peer = %p.local_id, "already started");
                return Vec::new();
            }
            p.session.set_phase(Phase::SearchingForOpponent);
            tracing::info!(peer = %p.local_id, "searching for an opponent");
            vec![p.publish(Message::PlayRequest {
                sender: p.local_id.clone(),
            })]
        })
    }

    /// Abandon the current game and search again. The role survives.
    pub fn restart(&mut self) -> Vec<RuntimeEffect> {
        self.observed(|p| {
            p.session.restart();
            p.pending = None;
            p.health.refresh();
            tracing::info!(peer = %p.local_id, "restarted, searching for an opponent");
            vec![p.publish(Message::PlayRequest {
                sender: p.local_id.clone(),
            })]
        })
    }

    pub fn handle_command(&mut self, cmd: RuntimeCommand) -> Vec<RuntimeEffect> {
        match cmd {
            RuntimeCommand::Restart => self.restart(),
            RuntimeCommand::TransportLost => self.handle_transport_lost(),
            RuntimeCommand::TransportRestored => self.handle_transport_restored(),
            RuntimeCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Vec::new()
            }
            // Handled by the loop itself.
            RuntimeCommand::Shutdown => Vec::new(),
        }
    }

    // ── Transport connectivity ──────────────────────────────────────

    /// Our own link to the bus dropped: nothing we believe can be trusted.
    pub fn handle_transport_lost(&mut self) -> Vec<RuntimeEffect> {
        self.observed(|p| {
            tracing::warn!(peer = %p.local_id, "transport lost");
            p.mark_inconsistent();
            Vec::new()
        })
    }

    /// Link is back. The `First` side asks for a consistency check.
    pub fn handle_transport_restored(&mut self) -> Vec<RuntimeEffect> {
        self.observed(|p| {
            if p.session.phase() != Phase::Inconsistent {
                return Vec::new();
            }
            p.session.rollback_phase();
            p.health.refresh();
            tracing::info!(peer = %p.local_id, "transport restored, back to {}", p.session.phase());
            if p.session.move_type() == Some(MoveType::First) && p.session.opponent().is_some() {
                vec![p.consistency_check()]
            } else {
                Vec::new()
            }
        })
    }

    // ── Timers ──────────────────────────────────────────────────────

    /// Periodic liveness broadcast. Sent in every phase.
    pub fn tick_alive(&mut self) -> Vec<RuntimeEffect> {
        vec![self.publish(Message::AliveEvent {
            sender: self.local_id.clone(),
        })]
    }

    /// One liveness window elapsed.
    pub fn tick_liveness(&mut self) -> Vec<RuntimeEffect> {
        self.observed(|p| match p.health.check(&p.session) {
            Liveness::Failed { misses } => {
                tracing::warn!(
                    peer = %p.local_id,
                    "opponent silent for {misses} windows, marking session inconsistent"
                );
                p.mark_inconsistent();
                vec![RuntimeEffect::Emit(ProtocolEvent::OpponentSuspected { misses })]
            }
            Liveness::Suspect { misses } => {
                tracing::debug!(peer = %p.local_id, misses, "opponent silent");
                vec![RuntimeEffect::Emit(ProtocolEvent::OpponentSuspected { misses })]
            }
            Liveness::Alive | Liveness::Idle => Vec::new(),
        })
    }

    // ── Incoming messages ───────────────────────────────────────────

    /// Decode a raw frame from the bus and process it.
    pub fn handle_incoming(&mut self, raw: &[u8]) -> Vec<RuntimeEffect> {
        match Message::from_bytes(raw) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                tracing::debug!(peer = %self.local_id, "bad frame: {e}");
                Vec::new()
            }
        }
    }

    pub fn handle_message(&mut self, msg: Message) -> Vec<RuntimeEffect> {
        if self.validator.is_from_myself(msg.sender()) {
            return Vec::new();
        }
        tracing::debug!(
            peer = %self.local_id,
            from = %msg.sender(),
            kind = msg.kind(),
            phase = %self.session.phase(),
            "received"
        );
        self.observed(|p| {
            let mut effects = p.on_opponent_traffic(&msg);
            effects.extend(p.dispatch(msg));
            effects
        })
    }

    /// Heartbeat refresh and the way back out of `Inconsistent`.
    fn on_opponent_traffic(&mut self, msg: &Message) -> Vec<RuntimeEffect> {
        let sender = msg.sender();
        if !self.session.is_opponent(sender) {
            return Vec::new();
        }
        self.health.refresh();

        if self.session.phase() != Phase::Inconsistent {
            return Vec::new();
        }
        self.session.rollback_phase();
        tracing::info!(
            peer = %self.local_id,
            "heard from {sender} again, back to {}",
            self.session.phase()
        );
        // A reconciliation in flight or a fresh play request carries its own check.
        if msg.is_reconciliation() || matches!(msg, Message::PlayRequest { .. }) {
            Vec::new()
        } else {
            vec![self.consistency_check()]
        }
    }

    fn dispatch(&mut self, msg: Message) -> Vec<RuntimeEffect> {
        match msg {
            Message::PlayRequest { sender } => self.on_play_request(sender),
            Message::PlayRequestAccepted { sender } => self.on_play_request_accepted(sender),
            Message::MoveTypeApprovalRequest { sender, move_type } => {
                self.on_move_type_approval_request(sender, move_type)
            }
            Message::MoveTypeApproved { sender, move_type } => {
                self.on_move_type_approved(sender, move_type)
            }
            Message::MoveTypeRejected { sender, move_type } => {
                self.on_move_type_rejected(sender, move_type)
            }
            Message::MoveApprovalRequest {
                sender,
                move_type,
                coordinates,
            } => self.on_move_approval_request(sender, move_type, coordinates),
            Message::MoveApproved {
                sender,
                move_type,
                coordinates,
            } => self.on_move_approved(sender, move_type, coordinates),
            Message::MoveRejected {
                sender,
                coordinates,
                ..
            } => self.on_move_rejected(sender, coordinates),
            Message::MoveMade {
                sender,
                move_type,
                coordinates,
            } => self.on_move_made(sender, move_type, coordinates),
            Message::GameIsOver { sender } => self.on_game_is_over(sender),
            Message::GameStateRequest { sender } => self.on_game_state_request(sender),
            Message::GameStateProvided {
                sender,
                phase,
                move_type,
                moves,
            } => self.on_game_state_provided(
                sender,
                GameView {
                    phase,
                    move_type,
                    moves,
                },
            ),
            Message::RecoveryRequest {
                sender,
                phase,
                move_type,
                moves,
            } => self.on_recovery_request(
                sender,
                GameView {
                    phase,
                    move_type,
                    moves,
                },
            ),
            Message::InstanceRecovered { sender } => self.on_instance_recovered(sender),
            Message::ConsistencyCheckRequest {
                sender,
                phase,
                move_type,
                moves,
            } => self.on_consistency_check_request(
                sender,
                GameView {
                    phase,
                    move_type,
                    moves,
                },
            ),
            Message::ConsistencyCheckResponse {
                sender,
                phase,
                move_type,
                moves,
                consistent,
            } => self.on_consistency_check_response(
                sender,
                GameView {
                    phase,
                    move_type,
                    moves,
                },
                consistent,
            ),
            Message::MakeMoveRequest { sender } => self.on_make_move_request(sender),
            // Liveness only; the refresh already happened.
            Message::AliveEvent { .. } => Vec::new(),
        }
    }

    // ── Negotiation ─────────────────────────────────────────────────

    fn on_play_request(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        match self.session.phase() {
            Phase::SearchingForOpponent if self.session.is_opponent(&sender) => {
                tracing::debug!(peer = %self.local_id, "repeated play request from {sender}");
                Vec::new()
            }
            Phase::SearchingForOpponent => {
                tracing::info!(peer = %self.local_id, "{sender} wants to play, accepting");
                let mut effects = vec![self.publish(Message::PlayRequestAccepted {
                    sender: self.local_id.clone(),
                })];
                effects.extend(self.bind_and_negotiate(sender));
                effects
            }
            Phase::Idle | Phase::CheckingOpponentState => Vec::new(),
            // Someone else looking for a game; ours is bound.
            _ if self.validator.is_stranger(&self.session, &sender) => Vec::new(),
            // Either a late copy of the request we already answered, or the
            // opponent restarted mid-negotiation. Accepting again is harmless
            // in the first case and rebinds it in the second.
            Phase::OpponentFound | Phase::ChoosingMoveType => {
                tracing::debug!(peer = %self.local_id, "play request from {sender} while negotiating");
                vec![self.publish(Message::PlayRequestAccepted {
                    sender: self.local_id.clone(),
                })]
            }
            _ => {
                tracing::info!(
                    peer = %self.local_id,
                    "play request from {sender} during {}, checking its state",
                    self.session.phase()
                );
                self.session.set_phase(Phase::CheckingOpponentState);
                vec![self.publish(Message::GameStateRequest {
                    sender: self.local_id.clone(),
                })]
            }
        }
    }

    fn on_play_request_accepted(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::SearchingForOpponent)
        {
            return Vec::new();
        }
        tracing::info!(peer = %self.local_id, "{sender} accepted our play request");
        self.bind_and_negotiate(sender)
    }

    /// Bind `opponent`, draw a role and ask the opponent to approve it.
    fn bind_and_negotiate(&mut self, opponent: PeerId) -> Vec<RuntimeEffect> {
        self.session.bind_opponent(opponent);
        self.session.set_phase(Phase::OpponentFound);
        self.health.refresh();
        self.propose_move_type()
    }

    fn propose_move_type(&mut self) -> Vec<RuntimeEffect> {
        let move_type = if self.rng.random_bool(0.5) {
            MoveType::First
        } else {
            MoveType::Second
        };
        self.session.set_move_type(move_type);
        self.session.set_phase(Phase::ChoosingMoveType);
        tracing::debug!(peer = %self.local_id, ?move_type, "proposing move type");
        vec![
            self.publish(Message::MoveTypeApprovalRequest {
                sender: self.local_id.clone(),
                move_type,
            }),
            RuntimeEffect::Emit(ProtocolEvent::MoveTypeChosen { move_type }),
        ]
    }

    fn on_move_type_approval_request(
        &mut self,
        sender: PeerId,
        proposed: MoveType,
    ) -> Vec<RuntimeEffect> {
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::ChoosingMoveType)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        let me = self.local_id.clone();
        if self.session.move_type() == Some(proposed) {
            tracing::debug!(peer = %me, ?proposed, "{sender} wants our move type, rejecting");
            vec![self.publish(Message::MoveTypeRejected {
                sender: me,
                move_type: proposed,
            })]
        } else {
            // Opposite roles: ours is settled as well.
            let mut effects = vec![self.publish(Message::MoveTypeApproved {
                sender: me,
                move_type: proposed,
            })];
            effects.extend(self.begin_play(&sender));
            effects
        }
    }

    fn on_move_type_rejected(&mut self, sender: PeerId, rejected: MoveType) -> Vec<RuntimeEffect> {
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::ChoosingMoveType)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        if self.session.move_type() != Some(rejected) {
            tracing::debug!(peer = %self.local_id, ?rejected, "stale move type rejection");
            return Vec::new();
        }
        self.propose_move_type()
    }

    fn on_move_type_approved(&mut self, sender: PeerId, approved: MoveType) -> Vec<RuntimeEffect> {
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::ChoosingMoveType)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        if self.session.move_type() != Some(approved) {
            tracing::debug!(peer = %self.local_id, ?approved, "stale move type approval");
            return Vec::new();
        }
        self.begin_play(&sender)
    }

    /// Roles are settled: enter play, and open it if we are `First`.
    fn begin_play(&mut self, opponent: &PeerId) -> Vec<RuntimeEffect> {
        self.session.set_phase(Phase::InProgress);
        let move_type = self.session.move_type();
        tracing::info!(peer = %self.local_id, "game against {opponent} started as {move_type:?}");
        if move_type == Some(MoveType::First) {
            self.propose_move()
        } else {
            Vec::new()
        }
    }

    /// A play message from the opponent while we still wait on the role
    /// negotiation means it already plays: compare states.
    fn ahead_of_negotiation(&self, sender: &PeerId) -> Option<Vec<RuntimeEffect>> {
        if self.session.phase() == Phase::ChoosingMoveType && self.session.is_opponent(sender) {
            tracing::info!(
                peer = %self.local_id,
                "{sender} is already playing, checking consistency"
            );
            Some(vec![self.consistency_check()])
        } else {
            None
        }
    }

    // ── Play ────────────────────────────────────────────────────────

    /// Ask the opponent to approve a move. Repeats the pending cell if any.
    fn propose_move(&mut self) -> Vec<RuntimeEffect> {
        let Some(move_type) = self.session.move_type() else {
            return Vec::new();
        };
        if self.session.phase() != Phase::InProgress {
            return Vec::new();
        }
        let coordinates = match self.pending {
            Some(pending) if self.session.is_free(pending) => pending,
            _ => {
                let free = self.session.board().free_cells();
                if free.is_empty() {
                    return Vec::new();
                }
                free[self.rng.random_range(0..free.len())]
            }
        };
        self.pending = Some(coordinates);
        tracing::debug!(peer = %self.local_id, "proposing move at {coordinates}");
        vec![self.publish(Message::MoveApprovalRequest {
            sender: self.local_id.clone(),
            move_type,
            coordinates,
        })]
    }

    /// Is it `sender`'s turn to play `move_type` at `coordinates`?
    fn is_legal_proposal(&self, sender: &PeerId, move_type: MoveType, at: Coordinates) -> bool {
        if !at.is_on_board() || !self.session.is_free(at) {
            return false;
        }
        if Some(move_type.complement()) != self.session.move_type() {
            return false;
        }
        match self.session.last_move() {
            None => move_type == MoveType::First,
            Some(last) => last.sender != *sender && last.sender == self.local_id,
        }
    }

    fn on_move_approval_request(
        &mut self,
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    ) -> Vec<RuntimeEffect> {
        if let Some(effects) = self.ahead_of_negotiation(&sender) {
            return effects;
        }
        if self.validator.game_not_ready(&self.session)
            || self
                .validator
                .is_unexpected_phase(&self.session, Phase::InProgress)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        let me = self.local_id.clone();
        if self.is_legal_proposal(&sender, move_type, coordinates) {
            vec![self.publish(Message::MoveApproved {
                sender: me,
                move_type,
                coordinates,
            })]
        } else {
            tracing::info!(peer = %me, "rejecting move by {sender} at {coordinates}");
            vec![self.publish(Message::MoveRejected {
                sender: me,
                move_type,
                coordinates,
            })]
        }
    }

    fn on_move_approved(
        &mut self,
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    ) -> Vec<RuntimeEffect> {
        if self.validator.game_not_ready(&self.session)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::InProgress)
        {
            return vec![self.consistency_check()];
        }
        if self.pending != Some(coordinates) || self.session.move_type() != Some(move_type) {
            tracing::debug!(peer = %self.local_id, "approval at {coordinates} matches no pending proposal");
            return Vec::new();
        }
        self.pending = None;

        let mv = Move::new(self.local_id.clone(), move_type, coordinates);
        match self.session.record_move(mv.clone()) {
            Ok(()) => {
                tracing::info!(peer = %self.local_id, "move at {coordinates} committed");
                vec![
                    self.publish(Message::MoveMade {
                        sender: self.local_id.clone(),
                        move_type,
                        coordinates,
                    }),
                    RuntimeEffect::Emit(ProtocolEvent::MoveCommitted { mv }),
                ]
            }
            Err(e) => {
                tracing::warn!(peer = %self.local_id, "approved move not applicable: {e}");
                vec![self.consistency_check()]
            }
        }
    }

    fn on_move_rejected(&mut self, sender: PeerId, coordinates: Coordinates) -> Vec<RuntimeEffect> {
        if self.validator.game_not_ready(&self.session)
            || self.validator.is_stranger(&self.session, &sender)
            || self
                .validator
                .is_unexpected_phase(&self.session, Phase::InProgress)
        {
            return Vec::new();
        }
        self.pending = None;
        tracing::warn!(
            peer = %self.local_id,
            "{sender} rejected our move at {coordinates}, checking consistency"
        );
        vec![self.consistency_check()]
    }

    fn on_move_made(
        &mut self,
        sender: PeerId,
        move_type: MoveType,
        coordinates: Coordinates,
    ) -> Vec<RuntimeEffect> {
        if let Some(effects) = self.ahead_of_negotiation(&sender) {
            return effects;
        }
        if self.validator.game_not_ready(&self.session)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::InProgress)
            || self.session.move_type() == Some(move_type)
        {
            return vec![self.consistency_check()];
        }

        let mv = Move::new(sender, move_type, coordinates);
        if let Err(e) = self.session.record_move(mv.clone()) {
            tracing::warn!(peer = %self.local_id, "opponent move not applicable: {e}");
            return vec![self.consistency_check()];
        }

        let mut effects = vec![RuntimeEffect::Emit(ProtocolEvent::MoveCommitted { mv })];
        if self.session.board().is_over() {
            let outcome = self.session.board().outcome();
            self.session.set_phase(Phase::IsOver);
            tracing::info!(peer = %self.local_id, ?outcome, "game over");
            effects.push(self.publish(Message::GameIsOver {
                sender: self.local_id.clone(),
            }));
            effects.push(RuntimeEffect::Emit(ProtocolEvent::GameOver { outcome }));
        } else {
            effects.extend(self.propose_move());
        }
        effects
    }

    fn on_game_is_over(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        if self.validator.game_not_ready(&self.session)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        if self.session.phase() == Phase::IsOver && self.session.board().is_over() {
            return Vec::new();
        }
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::InProgress)
        {
            return vec![self.consistency_check()];
        }
        if !self.session.board().is_over() {
            tracing::error!(
                peer = %self.local_id,
                "{sender} claims the game is over, local board disagrees"
            );
            let check = self.consistency_check();
            self.mark_inconsistent();
            return vec![check];
        }
        let outcome = self.session.board().outcome();
        self.session.set_phase(Phase::IsOver);
        self.pending = None;
        tracing::info!(peer = %self.local_id, ?outcome, "game over");
        vec![RuntimeEffect::Emit(ProtocolEvent::GameOver { outcome })]
    }

    fn on_make_move_request(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        if let Some(effects) = self.ahead_of_negotiation(&sender) {
            return effects;
        }
        if self.validator.is_stranger(&self.session, &sender)
            || self
                .validator
                .is_unexpected_phase(&self.session, Phase::InProgress)
        {
            return Vec::new();
        }
        match reconcile::resume_action(&self.session, &self.local_id) {
            ResumeAction::ProposeMove => self.propose_move(),
            ResumeAction::AskOpponent => {
                tracing::info!(
                    peer = %self.local_id,
                    "both sides wait for the other to move, checking consistency"
                );
                vec![self.consistency_check()]
            }
            ResumeAction::Wait => Vec::new(),
        }
    }

    // ── Recovery and reconciliation ────────────────────────────────

    fn on_game_state_request(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        tracing::debug!(peer = %self.local_id, "{sender} asked for our state");
        let view = self.session.view();
        vec![self.publish(Message::GameStateProvided {
            sender: self.local_id.clone(),
            phase: view.phase,
            move_type: view.move_type,
            moves: view.moves,
        })]
    }

    fn on_game_state_provided(&mut self, sender: PeerId, theirs: GameView) -> Vec<RuntimeEffect> {
        if self
            .validator
            .is_unexpected_phase(&self.session, Phase::CheckingOpponentState)
            || self.validator.is_stranger(&self.session, &sender)
        {
            return Vec::new();
        }
        self.session.rollback_phase();
        if theirs.phase == Phase::SearchingForOpponent {
            tracing::info!(peer = %self.local_id, "{sender} lost its game, sending recovery");
            let view = self.session.view();
            vec![self.publish(Message::RecoveryRequest {
                sender: self.local_id.clone(),
                phase: view.phase,
                move_type: view.move_type,
                moves: view.moves,
            })]
        } else {
            vec![self.consistency_check()]
        }
    }

    fn on_recovery_request(&mut self, sender: PeerId, theirs: GameView) -> Vec<RuntimeEffect> {
        if self.validator.is_stranger(&self.session, &sender) {
            return Vec::new();
        }
        let own = self.session.view();
        let consistent = reconcile::is_consistent(&own, &theirs);
        let mut effects = Vec::new();
        if consistent {
            tracing::info!(peer = %self.local_id, "recovery from {sender}: already consistent");
            self.session.bind_opponent(sender.clone());
        } else {
            tracing::info!(
                peer = %self.local_id,
                "recovering game from {sender} ({} moves)",
                theirs.moves.len()
            );
            self.pending = None;
            self.session
                .accept_view(sender.clone(), reconcile::adopt(&theirs));
        }
        self.health.refresh();
        effects.push(RuntimeEffect::Emit(ProtocolEvent::Reconciled {
            with: sender,
            consistent,
            kept_moves: self.session.moves().len(),
        }));
        effects.push(self.publish(Message::InstanceRecovered {
            sender: self.local_id.clone(),
        }));
        effects
    }

    fn on_instance_recovered(&mut self, sender: PeerId) -> Vec<RuntimeEffect> {
        if self.validator.is_stranger(&self.session, &sender) {
            return Vec::new();
        }
        if self.session.phase() == Phase::CheckingOpponentState {
            self.session.rollback_phase();
        }
        if !self.session.is_opponent(&sender) {
            self.session.bind_opponent(sender.clone());
        }
        tracing::info!(peer = %self.local_id, "{sender} recovered, resuming");
        self.resume()
    }

    fn on_consistency_check_request(
        &mut self,
        sender: PeerId,
        theirs: GameView,
    ) -> Vec<RuntimeEffect> {
        if self.validator.is_stranger(&self.session, &sender) {
            return Vec::new();
        }
        let own = self.session.view();
        let consistent = reconcile::is_consistent(&own, &theirs);
        let mut effects = Vec::new();
        if consistent {
            if self.session.opponent().is_none() {
                self.session.bind_opponent(sender.clone());
            }
        } else {
            let target = reconcile::reconcile(&own, &theirs);
            tracing::warn!(
                peer = %self.local_id,
                "state diverged from {sender}, keeping {} of {} moves",
                target.moves.len(),
                own.moves.len()
            );
            self.pending = None;
            self.session.accept_view(sender.clone(), target);
            effects.push(RuntimeEffect::Emit(ProtocolEvent::Reconciled {
                with: sender,
                consistent,
                kept_moves: self.session.moves().len(),
            }));
        }

        let view = self.session.view();
        effects.push(self.publish(Message::ConsistencyCheckResponse {
            sender: self.local_id.clone(),
            phase: view.phase,
            move_type: view.move_type,
            moves: view.moves,
            consistent,
        }));
        effects
    }

    fn on_consistency_check_response(
        &mut self,
        sender: PeerId,
        theirs: GameView,
        consistent: bool,
    ) -> Vec<RuntimeEffect> {
        if self.validator.is_stranger(&self.session, &sender) {
            return Vec::new();
        }
        if !consistent {
            let own = self.session.view();
            let target = reconcile::reconcile(&own, &theirs);
            tracing::info!(
                peer = %self.local_id,
                "{sender} reported divergence, restoring {} moves",
                target.moves.len()
            );
            self.pending = None;
            self.session.accept_view(sender.clone(), target);
        }
        let mut effects = vec![RuntimeEffect::Emit(ProtocolEvent::Reconciled {
            with: sender,
            consistent,
            kept_moves: self.session.moves().len(),
        })];
        effects.extend(self.resume());
        effects
    }

    /// Get play moving again: propose if it is our turn, nudge otherwise.
    fn resume(&mut self) -> Vec<RuntimeEffect> {
        match reconcile::resume_action(&self.session, &self.local_id) {
            ResumeAction::ProposeMove => self.propose_move(),
            ResumeAction::AskOpponent => vec![self.publish(Message::MakeMoveRequest {
                sender: self.local_id.clone(),
            })],
            ResumeAction::Wait => Vec::new(),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn publish(&self, msg: Message) -> RuntimeEffect {
        RuntimeEffect::Publish(msg)
    }

    fn consistency_check(&self) -> RuntimeEffect {
        self.publish(Message::consistency_check(
            self.local_id.clone(),
            self.session.view(),
        ))
    }

    fn mark_inconsistent(&mut self) {
        if self.session.phase() != Phase::Inconsistent {
            self.session.set_phase(Phase::Inconsistent);
        }
    }

    /// Run `f`, then report the phase and opponent changes it caused.
    fn observed(&mut self, f: impl FnOnce(&mut Self) -> Vec<RuntimeEffect>) -> Vec<RuntimeEffect> {
        let phase = self.session.phase();
        let opponent = self.session.opponent().cloned();

        let mut effects = f(self);

        let now = self.session.phase();
        if now != phase {
            effects.push(RuntimeEffect::Emit(ProtocolEvent::PhaseChanged {
                from: phase,
                to: now,
            }));
        }
        if self.session.opponent() != opponent.as_ref() {
            if let Some(opponent) = self.session.opponent() {
                effects.push(RuntimeEffect::Emit(ProtocolEvent::OpponentBound {
                    opponent: opponent.clone(),
                }));
            }
        }
        effects
    }
}
