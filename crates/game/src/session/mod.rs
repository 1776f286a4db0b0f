//! Two-peer session: connection, host election, game start, in-game
//! traffic and teardown.
//!
//! Every handler takes the simulation by `&mut`, so the caller decides the
//! execution context. [`crate::PeerDriver`] runs all of them on one task.

mod broadcast;
mod election;
mod reconcile;
mod state;

pub use broadcast::{BroadcastClock, DEFAULT_SNAPSHOT_RATE, SnapshotBroadcaster};
pub use election::{
    DrawSource, ElectionStep, HostElection, PeerRecord, ScriptedDraws, UniformDraw,
};
pub use reconcile::{ReconcileReport, StateReconciler};
pub use state::{IndexPair, SessionOutcome, SessionState};

use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::error::{DecodeError, SessionError};
use crate::net::{
    Envelope, EnvelopeCodec, EnvelopeTag, Kinematics, MoveUpdate, NetworkStats, PeerId,
    Reliability, SnapshotFrame, Transport, TransportEvent, required_fields,
};
use crate::sim::Simulation;

pub struct NetworkSession<T> {
    config: SessionConfig,
    local: PeerId,
    remote: Option<PeerId>,
    transport: T,
    connected: bool,
    state: SessionState,
    election: HostElection,
    indices: Option<IndexPair>,
    broadcaster: SnapshotBroadcaster,
    codec: EnvelopeCodec,
    outcome: Option<SessionOutcome>,
    closed: bool,
    stats: NetworkStats,
}

impl<T: Transport> NetworkSession<T> {
    pub fn new(config: SessionConfig, local: PeerId, transport: T) -> Self {
        let draws = Box::new(UniformDraw::new(config.draw_upper_bound));
        Self::with_draws(config, local, transport, draws)
    }

    pub fn with_draws(
        config: SessionConfig,
        local: PeerId,
        transport: T,
        draws: Box<dyn DrawSource>,
    ) -> Self {
        let election = HostElection::new(local, config.expected_peer_count, draws);
        log::debug!("{local} drew {}", election.local_number());
        Self {
            broadcaster: SnapshotBroadcaster::new(config.snapshot_rate_hz),
            codec: EnvelopeCodec::new(config.wire_format),
            config,
            local,
            remote: None,
            transport,
            connected: false,
            state: SessionState::WaitingForMatch,
            election,
            indices: None,
            outcome: None,
            closed: false,
            stats: NetworkStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    pub fn remote_peer(&self) -> Option<PeerId> {
        self.remote
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// `None` until election resolves.
    pub fn is_host(&self) -> Option<bool> {
        self.indices.map(|i| i.is_host())
    }

    pub fn indices(&self) -> Option<IndexPair> {
        self.indices
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn election(&self) -> &HostElection {
        &self.election
    }

    pub fn broadcaster(&self) -> &SnapshotBroadcaster {
        &self.broadcaster
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn pump(&mut self, now: Instant) {
        if !self.closed {
            self.transport.pump(now);
        }
    }

    /// Entry point for everything the transport reports. Errors are logged
    /// and the offending event dropped; state is left as it was.
    pub fn handle_event<S: Simulation + ?Sized>(&mut self, event: TransportEvent, sim: &mut S) {
        if self.closed {
            log::debug!("session closed, dropping {event:?}");
            return;
        }
        match event {
            TransportEvent::Connected(peer) => self.on_peer_connected(peer, sim),
            TransportEvent::Disconnected(peer) => self.on_peer_disconnected(peer, sim),
            TransportEvent::Received { payload, from } => {
                if let Err(err) = self.on_receive(&payload, from, sim) {
                    self.report(&err);
                }
            }
        }
    }

    pub fn on_peer_connected<S: Simulation + ?Sized>(&mut self, peer: PeerId, sim: &mut S) {
        if self.state != SessionState::WaitingForMatch {
            log::warn!("{peer} connected while {:?}, ignoring", self.state);
            return;
        }
        self.remote = Some(peer);
        self.connected = true;
        self.transition(SessionState::WaitingForRandomNumber);

        let value = self.election.local_number();
        if let Err(err) = self.announce(value) {
            self.report(&err);
        }

        // The peer's number may have arrived before the connect event.
        if self.election.is_resolved() {
            self.on_election_resolved(sim);
        }
    }

    pub fn on_peer_disconnected<S: Simulation + ?Sized>(&mut self, peer: PeerId, sim: &mut S) {
        if self.remote.is_some_and(|remote| remote != peer) {
            log::warn!("disconnect from unknown {peer}, ignoring");
            return;
        }
        self.connected = false;
        if self.state.is_done() {
            return;
        }
        log::info!("{peer} disconnected");
        self.finish(SessionOutcome::Disconnected, sim);
    }

    pub fn on_receive<S: Simulation + ?Sized>(
        &mut self,
        payload: &[u8],
        from: PeerId,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.stats.record_received(payload.len());

        let envelope = self.codec.decode(payload).inspect_err(|_| {
            self.stats.decode_failures += 1;
        })?;
        log::trace!("{} from {from}", envelope.tag().as_str());
        self.dispatch(envelope, from, sim)
    }

    fn dispatch<S: Simulation + ?Sized>(
        &mut self,
        envelope: Envelope,
        from: PeerId,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        match envelope {
            Envelope::RandomNumber { value } => self.handle_random_number(from, value, sim),
            Envelope::GameBegin => self.handle_game_begin(sim),
            Envelope::Move(update) => self.handle_move(&update, sim),
            Envelope::GameOver { host_won } => self.handle_game_over(host_won, sim),
            Envelope::Snapshot(frame) => self.handle_snapshot(&frame, sim),
        }
    }

    fn handle_random_number<S: Simulation + ?Sized>(
        &mut self,
        from: PeerId,
        value: f64,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            SessionState::WaitingForMatch | SessionState::WaitingForRandomNumber
        ) || self.election.is_resolved()
        {
            return Err(self.unexpected(EnvelopeTag::RandomNumber));
        }

        match self.election.observe(from, value) {
            ElectionStep::Pending => Ok(()),
            ElectionStep::Tie { redrawn } => self.announce(redrawn),
            ElectionStep::Resolved { host } => {
                log::debug!("election resolved, host is {host}");
                if self.state == SessionState::WaitingForRandomNumber {
                    self.on_election_resolved(sim);
                }
                Ok(())
            }
        }
    }

    /// Sends the local number. Until it reaches a connected transport, a
    /// matching peer number is not a tie the peer can see.
    fn announce(&mut self, value: f64) -> Result<(), SessionError> {
        self.send(Envelope::RandomNumber { value }, Reliability::Reliable)?;
        if self.connected {
            self.election.mark_announced();
        }
        Ok(())
    }

    fn on_election_resolved<S: Simulation + ?Sized>(&mut self, sim: &mut S) {
        let is_host = self.election.local_is_host().unwrap_or(false);
        let indices = IndexPair::for_role(is_host);
        self.indices = Some(indices);
        log::info!(
            "{} is {} (player {})",
            self.local,
            if is_host { "host" } else { "client" },
            indices.local
        );
        self.transition(SessionState::WaitingForStart);

        if is_host {
            self.begin_game(sim);
        }
    }

    /// Host only: go active, tell the peer, start broadcasting with resources.
    fn begin_game<S: Simulation + ?Sized>(&mut self, sim: &mut S) {
        self.transition(SessionState::Active);
        if let Err(err) = self.send(Envelope::GameBegin, Reliability::Reliable) {
            self.report(&err);
        }
        self.broadcaster.enable();
        self.broadcaster.include_resources();
        self.start_simulation(sim);
    }

    fn handle_game_begin<S: Simulation + ?Sized>(&mut self, sim: &mut S) -> Result<(), SessionError> {
        if self.state != SessionState::WaitingForStart || self.is_host() != Some(false) {
            return Err(self.unexpected(EnvelopeTag::GameBegin));
        }
        self.transition(SessionState::Active);
        self.broadcaster.enable();
        self.start_simulation(sim);
        Ok(())
    }

    fn start_simulation<S: Simulation + ?Sized>(&mut self, sim: &mut S) {
        let Some(indices) = self.indices else {
            return;
        };
        if sim.player_count() < self.config.player_count {
            log::warn!(
                "simulation has {} players, session expects {}",
                sim.player_count(),
                self.config.player_count
            );
        }
        sim.on_session_started(indices.local);
    }

    fn handle_move<S: Simulation + ?Sized>(
        &mut self,
        update: &MoveUpdate,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        let Some(reconciler) = self.active_reconciler() else {
            return Err(self.unexpected(EnvelopeTag::Move));
        };
        reconciler.apply_move(sim, update)?;
        Ok(())
    }

    fn handle_snapshot<S: Simulation + ?Sized>(
        &mut self,
        frame: &SnapshotFrame,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        let Some(reconciler) = self.active_reconciler() else {
            return Err(self.unexpected(EnvelopeTag::Snapshot));
        };
        let report = reconciler.apply_snapshot(sim, frame);
        self.stats.snapshots_applied += 1;
        log::trace!("applied snapshot from player {}: {report:?}", frame.sender_index);
        Ok(())
    }

    fn handle_game_over<S: Simulation + ?Sized>(
        &mut self,
        host_won: bool,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        let Some(indices) = self.indices.filter(|_| self.state == SessionState::Active) else {
            return Err(self.unexpected(EnvelopeTag::GameOver));
        };
        let local_won = host_won == indices.is_host();
        self.finish(SessionOutcome::GameOver { local_won }, sim);
        Ok(())
    }

    fn active_reconciler(&self) -> Option<StateReconciler> {
        match (self.state, self.indices) {
            (SessionState::Active, Some(indices)) => Some(StateReconciler::new(indices)),
            _ => None,
        }
    }

    /// Reports the local player's motion. Reliable, in send order.
    pub fn send_move(&mut self, motion: Kinematics, was_launch: bool) -> Result<(), SessionError> {
        self.send_move_with(motion, was_launch, EnvelopeTag::Move.default_reliability())
    }

    /// Continuous drift that the next update supersedes anyway.
    pub fn send_move_unreliable(&mut self, motion: Kinematics) -> Result<(), SessionError> {
        self.send_move_with(motion, false, Reliability::BestEffort)
    }

    fn send_move_with(
        &mut self,
        motion: Kinematics,
        was_launch: bool,
        reliability: Reliability,
    ) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let Some(indices) = self.indices.filter(|_| self.state == SessionState::Active) else {
            return Ok(());
        };
        let update = MoveUpdate {
            player_index: indices.local,
            motion,
            was_launch,
        };
        self.send(Envelope::Move(update), reliability)
    }

    /// Announces the result and ends the session locally.
    pub fn send_game_over<S: Simulation + ?Sized>(
        &mut self,
        host_won: bool,
        sim: &mut S,
    ) -> Result<(), SessionError> {
        let Some(indices) = self.indices.filter(|_| self.state == SessionState::Active) else {
            return Ok(());
        };
        let sent = self.send(Envelope::GameOver { host_won }, Reliability::Reliable);
        let local_won = host_won == indices.is_host();
        self.finish(SessionOutcome::GameOver { local_won }, sim);
        sent
    }

    /// Host only. Returns `true` once a winner was found and announced.
    pub fn check_win<S: Simulation + ?Sized>(&mut self, sim: &mut S) -> Result<bool, SessionError> {
        if self.state != SessionState::Active || self.is_host() != Some(true) {
            return Ok(false);
        }
        let Some(winner) = sim.winner() else {
            return Ok(false);
        };
        log::info!("player {winner} reached the target score");
        self.send_game_over(winner == 0, sim)?;
        Ok(true)
    }

    pub fn broadcast_period(&self) -> Duration {
        self.broadcaster.period()
    }

    /// Sends one snapshot if broadcasting is on.
    pub fn broadcast_snapshot<S: Simulation + ?Sized>(&mut self, sim: &S) -> Result<(), SessionError> {
        let Some(indices) = self.indices.filter(|_| self.state == SessionState::Active) else {
            return Ok(());
        };
        if !self.broadcaster.is_enabled() {
            return Ok(());
        }
        let frame = self.broadcaster.capture(sim, indices.local);
        self.send(Envelope::Snapshot(frame), EnvelopeTag::Snapshot.default_reliability())
    }

    /// Frame-driven alternative to a timer: feeds `delta` into the broadcast
    /// clock and sends at most one snapshot, however many periods elapsed.
    pub fn advance_broadcast<S: Simulation + ?Sized>(
        &mut self,
        delta: Duration,
        sim: &S,
    ) -> Result<bool, SessionError> {
        if self.broadcaster.advance(delta) == 0 {
            return Ok(false);
        }
        self.broadcast_snapshot(sim)?;
        Ok(true)
    }

    /// Stops broadcasting and detaches from the transport. Anything that
    /// arrives afterwards is dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connected = false;
        self.broadcaster.stop();
        self.transport.close();
        if !self.state.is_done() {
            self.transition(SessionState::Done);
        }
        log::debug!("{} closed session", self.local);
    }

    /// Encodes and hands one envelope to the transport. A no-op while no
    /// peer is connected.
    fn send(&mut self, envelope: Envelope, reliability: Reliability) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if !self.connected {
            log::trace!("not connected, skipping {}", envelope.tag().as_str());
            return Ok(());
        }

        let tag = envelope.tag();
        let payload = self.codec.encode(&envelope)?;
        let len = payload.len();
        if let Err(err) = self.transport.send(payload, reliability) {
            self.stats.send_failures += 1;
            return Err(err.into());
        }

        self.stats.record_sent(len);
        if tag == EnvelopeTag::Snapshot {
            self.stats.snapshots_sent += 1;
        }
        Ok(())
    }

    fn finish<S: Simulation + ?Sized>(&mut self, outcome: SessionOutcome, sim: &mut S) {
        self.transition(SessionState::Done);
        self.outcome = Some(outcome);
        self.broadcaster.stop();
        match outcome {
            SessionOutcome::GameOver { local_won } => sim.on_game_over(local_won),
            SessionOutcome::Disconnected => sim.on_disconnected(),
        }
        log::info!("{} finished: {outcome:?}", self.local);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::info!("{}: {:?} -> {next:?}", self.local, self.state);
            self.state = next;
        }
    }

    fn unexpected(&mut self, tag: EnvelopeTag) -> SessionError {
        self.stats.dropped_for_state += 1;
        SessionError::UnexpectedMessageForState {
            tag: tag.as_str(),
            state: self.state,
        }
    }

    fn report(&self, err: &SessionError) {
        match err {
            SessionError::Decode(
                DecodeError::MissingRequiredField { tag, .. } | DecodeError::InvalidField { tag, .. },
            ) => {
                let expected = EnvelopeTag::parse(tag).map(required_fields).unwrap_or_default();
                log::warn!("{}: dropping envelope: {err} (expects {expected:?})", self.local);
            }
            SessionError::Closed => log::debug!("{}: {err}", self.local),
            _ => log::warn!("{}: dropping envelope: {err}", self.local),
        }
    }
}

impl<T> std::fmt::Debug for NetworkSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("state", &self.state)
            .field("indices", &self.indices)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
