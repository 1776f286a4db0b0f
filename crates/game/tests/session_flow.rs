use std::time::Duration;

use glam::Vec2;
use tokio::sync::mpsc::UnboundedReceiver;

use arena::{
    ArenaWorld, DriverExit, ElementSnapshot, Envelope, EnvelopeCodec, Kinematics, LinkConditions,
    LoopbackLink, LoopbackTransport, NetworkSession, PeerDriver, PeerId, ScriptedDraws,
    SessionConfig, SessionOutcome, SessionState, Simulation, SnapshotFrame, TransportEvent,
    WireFormat, WorldSettings,
};

const A: PeerId = PeerId(0xA);
const B: PeerId = PeerId(0xB);

struct Peer {
    session: NetworkSession<LoopbackTransport>,
    world: ArenaWorld,
    events: UnboundedReceiver<TransportEvent>,
}

impl Peer {
    /// Handles everything already queued; returns how many events that was.
    fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.session.handle_event(event, &mut self.world);
            handled += 1;
        }
        handled
    }
}

fn pair_with(
    a_draws: Vec<f64>,
    b_draws: Vec<f64>,
    conditions: LinkConditions,
    config: SessionConfig,
) -> (LoopbackLink, Peer, Peer) {
    let (link, end_a, end_b) = LoopbackLink::pair_with_ids(A, B, conditions);
    let peer = |end: arena::LoopbackEnd, draws: Vec<f64>| Peer {
        session: NetworkSession::with_draws(
            config.clone(),
            end.peer,
            end.transport,
            Box::new(ScriptedDraws::new(draws, 1000.0)),
        ),
        world: ArenaWorld::new(WorldSettings::default()),
        events: end.events,
    };
    let a = peer(end_a, a_draws);
    let b = peer(end_b, b_draws);
    (link, a, b)
}

fn pair(a_draws: Vec<f64>, b_draws: Vec<f64>) -> (LoopbackLink, Peer, Peer) {
    pair_with(a_draws, b_draws, LinkConditions::default(), SessionConfig::default())
}

fn settle(a: &mut Peer, b: &mut Peer) {
    for _ in 0..32 {
        if a.drain() + b.drain() == 0 {
            return;
        }
    }
    panic!("peers never went quiet");
}

fn started(a_draws: Vec<f64>, b_draws: Vec<f64>) -> (LoopbackLink, Peer, Peer) {
    let (link, mut a, mut b) = pair(a_draws, b_draws);
    link.connect();
    settle(&mut a, &mut b);
    (link, a, b)
}

#[test]
fn larger_draw_hosts_and_client_waits_for_game_begin() {
    let (link, mut a, mut b) = pair(vec![812.4], vec![203.9]);
    link.connect();

    a.drain();
    assert_eq!(a.session.state(), SessionState::WaitingForRandomNumber);

    b.drain();
    assert_eq!(b.session.state(), SessionState::WaitingForStart);
    assert_eq!(b.session.is_host(), Some(false));

    a.drain();
    assert_eq!(a.session.state(), SessionState::Active);
    assert_eq!(a.session.is_host(), Some(true));
    assert_eq!(b.session.state(), SessionState::WaitingForStart);

    b.drain();
    assert_eq!(b.session.state(), SessionState::Active);
    assert_eq!(a.world.started_as(), Some(0));
    assert_eq!(b.world.started_as(), Some(1));
    assert_eq!(a.session.election().host(), b.session.election().host());
}

#[test]
fn repeated_ties_still_elect_one_host() {
    let (_link, a, b) = started(vec![500.0, 250.0, 900.0], vec![500.0, 250.0, 100.0]);

    assert_eq!(a.session.election().ties(), 2);
    assert_eq!(b.session.election().ties(), 2);
    assert_eq!(a.session.is_host(), Some(true));
    assert_eq!(b.session.is_host(), Some(false));
    assert_eq!(a.session.state(), SessionState::Active);
    assert_eq!(b.session.state(), SessionState::Active);
}

#[test]
fn launch_move_overwrites_remote_and_clears_lock() {
    let (_link, mut a, mut b) = started(vec![812.4], vec![203.9]);
    b.world.occupy(0, 3);

    a.session
        .send_move(Kinematics::at(Vec2::new(10.0, 20.0)), true)
        .unwrap();
    b.drain();

    let host_on_client = b.world.player(0).unwrap();
    assert_eq!(host_on_client.kinematics.position, Vec2::new(10.0, 20.0));
    assert_eq!(host_on_client.occupancy, None);
}

#[test]
fn client_snapshot_updates_host_players_only() {
    let (_link, mut a, mut b) = started(vec![812.4], vec![203.9]);
    b.world.set_motion(1, Kinematics::at(Vec2::new(-2.0, 6.0)));
    b.world.spawn_resource(Vec2::ONE, Vec2::ZERO);

    b.session.broadcast_snapshot(&b.world).unwrap();
    a.drain();

    assert_eq!(a.world.player(1).unwrap().kinematics.position, Vec2::new(-2.0, 6.0));
    assert_eq!(a.world.player(0).unwrap().kinematics.position, Vec2::new(-8.0, 0.0));
    assert_eq!(a.world.resource_count(), 0);
    assert_eq!(a.session.stats().snapshots_applied, 1);
}

#[test]
fn empty_resource_group_spawns_nothing() {
    let (_link, _a, mut b) = started(vec![812.4], vec![203.9]);
    let frame = SnapshotFrame {
        sender_index: 0,
        players: vec![
            ElementSnapshot::from_kinematics(Kinematics::at(Vec2::new(4.0, 4.0))),
            ElementSnapshot::from_kinematics(Kinematics::at(Vec2::new(9.0, 9.0))),
        ],
        resources: Some(vec![]),
    };
    let bytes = EnvelopeCodec::default()
        .encode(&Envelope::Snapshot(frame))
        .unwrap();

    b.session.on_receive(&bytes, A, &mut b.world).unwrap();

    assert_eq!(b.world.player(0).unwrap().kinematics.position, Vec2::new(4.0, 4.0));
    assert_eq!(b.world.player(1).unwrap().kinematics.position, Vec2::new(8.0, 0.0));
    assert_eq!(b.world.resource_count(), 0);
}

#[test]
fn host_snapshot_spawns_and_hands_over_resources() {
    let (_link, mut a, mut b) = started(vec![812.4], vec![203.9]);
    for i in 0..3 {
        a.world.spawn_resource(Vec2::new(i as f32, 5.0), Vec2::ZERO);
    }
    a.world.grab(0, 2);

    a.session.broadcast_snapshot(&a.world).unwrap();
    b.drain();

    assert_eq!(b.world.resource_count(), 3);
    assert_eq!(b.world.resource(1).unwrap().kinematics.position, Vec2::new(1.0, 5.0));
    assert_eq!(b.world.held_resources(0), vec![2]);

    a.session.broadcast_snapshot(&a.world).unwrap();
    b.drain();
    assert_eq!(b.world.resource_count(), 3);
}

#[test]
fn host_win_reaches_both_sides() {
    let (_link, mut a, mut b) = started(vec![812.4], vec![203.9]);
    for r in 0..3 {
        a.world.spawn_resource(Vec2::ZERO, Vec2::ZERO);
        a.world.mark_delivered(0, r);
    }

    assert!(a.session.check_win(&mut a.world).unwrap());
    b.drain();

    assert_eq!(a.session.outcome(), Some(SessionOutcome::GameOver { local_won: true }));
    assert_eq!(b.session.outcome(), Some(SessionOutcome::GameOver { local_won: false }));
    assert_eq!(b.world.outcome(), Some(SessionOutcome::GameOver { local_won: false }));
}

#[test]
fn link_drop_ends_both_as_disconnected() {
    let (link, mut a, mut b) = started(vec![812.4], vec![203.9]);

    link.disconnect();
    settle(&mut a, &mut b);

    for peer in [&a, &b] {
        assert_eq!(peer.session.state(), SessionState::Done);
        assert_eq!(peer.session.outcome(), Some(SessionOutcome::Disconnected));
        assert_eq!(peer.world.outcome(), Some(SessionOutcome::Disconnected));
    }
}

#[test]
fn closing_one_side_disconnects_the_other() {
    let (_link, mut a, mut b) = started(vec![812.4], vec![203.9]);

    a.session.close();
    b.drain();

    assert_eq!(b.session.outcome(), Some(SessionOutcome::Disconnected));
    assert_eq!(a.session.outcome(), None);
    assert_eq!(a.drain(), 0);
}

#[test]
fn binary_wire_format_end_to_end() {
    let config = SessionConfig::default().with_wire_format(WireFormat::Binary);
    let (link, mut a, mut b) = pair_with(vec![1.0], vec![2.0], LinkConditions::default(), config);
    link.connect();
    settle(&mut a, &mut b);

    assert_eq!(b.session.is_host(), Some(true));
    assert_eq!(a.session.state(), SessionState::Active);

    b.session
        .send_move(Kinematics::at(Vec2::new(3.0, -1.0)), false)
        .unwrap();
    a.drain();
    assert_eq!(a.world.player(0).unwrap().kinematics.position, Vec2::new(3.0, -1.0));
}

#[test]
fn total_snapshot_loss_keeps_reliable_traffic() {
    let (link, mut a, mut b) = pair_with(
        vec![812.4],
        vec![203.9],
        LinkConditions::lossy(100.0),
        SessionConfig::default(),
    );
    link.connect();
    settle(&mut a, &mut b);
    assert_eq!(b.session.state(), SessionState::Active);

    a.world.set_motion(0, Kinematics::at(Vec2::new(7.0, 7.0)));
    for _ in 0..5 {
        a.session.broadcast_snapshot(&a.world).unwrap();
    }
    b.drain();
    assert_eq!(b.session.stats().snapshots_applied, 0);
    assert_eq!(a.session.transport().dropped(), 5);

    a.session
        .send_move(Kinematics::at(Vec2::new(7.0, 7.0)), false)
        .unwrap();
    b.drain();
    assert_eq!(b.world.player(0).unwrap().kinematics.position, Vec2::new(7.0, 7.0));
}

#[test]
fn garbage_payload_is_dropped() {
    let (_link, _a, mut b) = started(vec![812.4], vec![203.9]);

    assert!(b.session.on_receive(b"{not json", A, &mut b.world).is_err());
    assert!(
        b.session
            .on_receive(br#"{"type":"teleport"}"#, A, &mut b.world)
            .is_err()
    );

    assert_eq!(b.session.state(), SessionState::Active);
    assert_eq!(b.session.stats().decode_failures, 2);
}

fn drivers(
    a_draws: Vec<f64>,
    b_draws: Vec<f64>,
    settings: WorldSettings,
) -> (
    LoopbackLink,
    PeerDriver<LoopbackTransport, ArenaWorld>,
    PeerDriver<LoopbackTransport, ArenaWorld>,
) {
    let (link, end_a, end_b) = LoopbackLink::pair_with_ids(A, B, LinkConditions::default());
    let driver = |end: arena::LoopbackEnd, draws: Vec<f64>| {
        let session = NetworkSession::with_draws(
            SessionConfig::default(),
            end.peer,
            end.transport,
            Box::new(ScriptedDraws::new(draws, 1000.0)),
        );
        PeerDriver::new(session, ArenaWorld::new(settings.clone()), end.events)
            .with_frame_rate(120)
    };
    let a = driver(end_a, a_draws);
    let b = driver(end_b, b_draws);
    (link, a, b)
}

#[tokio::test]
async fn drivers_play_to_a_win() {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings = WorldSettings {
        target_score: 1,
        ..Default::default()
    };
    let (link, mut host, mut client) = drivers(vec![700.0], vec![300.0], settings);
    link.connect();

    let host_play = |session: &mut NetworkSession<LoopbackTransport>,
                     world: &mut ArenaWorld,
                     _dt: Duration| {
        if session.state() != SessionState::Active || world.resource_count() > 0 {
            return;
        }
        let zone = world.settings().deposit_center;
        let resource = world.spawn_resource(zone, Vec2::ZERO);
        world.set_motion(0, Kinematics::at(zone));
        world.grab(0, resource);
        world.deposit(0, resource);
    };
    let idle = |_: &mut NetworkSession<LoopbackTransport>, _: &mut ArenaWorld, _: Duration| {};

    let (host_exit, client_exit) = tokio::join!(
        host.run(host_play, tokio::time::sleep(Duration::from_secs(5))),
        client.run(idle, tokio::time::sleep(Duration::from_secs(5))),
    );

    assert_eq!(host_exit, DriverExit::Finished(SessionOutcome::GameOver { local_won: true }));
    assert_eq!(
        client_exit,
        DriverExit::Finished(SessionOutcome::GameOver { local_won: false })
    );
    assert!(host.session().is_closed());
    assert_eq!(client.sim().outcome(), Some(SessionOutcome::GameOver { local_won: false }));
}

#[tokio::test]
async fn shutdown_of_one_driver_disconnects_the_other() {
    let (link, mut a, mut b) = drivers(vec![700.0], vec![300.0], WorldSettings::default());
    link.connect();
    let idle = |_: &mut NetworkSession<LoopbackTransport>, _: &mut ArenaWorld, _: Duration| {};

    let (a_exit, b_exit) = tokio::join!(
        a.run(idle, tokio::time::sleep(Duration::from_millis(100))),
        b.run(idle, tokio::time::sleep(Duration::from_secs(5))),
    );

    assert_eq!(a_exit, DriverExit::Shutdown);
    assert_eq!(b_exit, DriverExit::Finished(SessionOutcome::Disconnected));
    let (session, world) = b.into_parts();
    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(world.outcome(), Some(SessionOutcome::Disconnected));
}
