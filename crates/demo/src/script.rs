use std::f32::consts::TAU;
use std::time::Duration;

use glam::Vec2;

use arena::{ArenaWorld, NetworkSession, SessionState, Simulation, Transport};

const SPEED: f32 = 6.0;
const LAUNCH_DISTANCE: f32 = 8.0;
const REACH: f32 = 1.0;
const SPAWN_RADIUS: f32 = 10.0;
const DRIFT_SEND_PERIOD: Duration = Duration::from_millis(100);

/// Bot that fetches the nearest free resource and carries it to the deposit
/// zone. The host also seeds the arena with resources once the game begins.
pub struct ScriptedPlayer {
    resources: usize,
    since_drift_send: Duration,
}

impl ScriptedPlayer {
    pub fn new(resources: usize) -> Self {
        Self {
            resources,
            since_drift_send: Duration::ZERO,
        }
    }

    pub fn frame<T: Transport>(&mut self, session: &mut NetworkSession<T>, world: &mut ArenaWorld, dt: Duration) {
        if session.state() != SessionState::Active {
            return;
        }
        let Some(indices) = session.indices() else {
            return;
        };
        let me = indices.local;

        if indices.is_host() && world.resource_count() == 0 {
            self.seed(world);
        }

        let Some(body) = world.player(me) else {
            return;
        };
        let position = body.kinematics.position;
        let carrying = body.held().first().copied();

        let target = match carrying {
            Some(resource) => {
                if world.deposit(me, resource) {
                    log::info!("player {me} delivered resource {resource}");
                    return;
                }
                world.settings().deposit_center
            }
            None => match world.nearest_free_resource(position) {
                Some(resource) => {
                    let at = world.resource(resource).map(|r| r.kinematics.position);
                    if at.is_some_and(|at| at.distance(position) <= REACH) && world.grab(me, resource) {
                        log::debug!("player {me} picked up resource {resource}");
                    }
                    at.unwrap_or(position)
                }
                None => return,
            },
        };

        self.steer(session, world, me, target, dt);
    }

    fn seed(&self, world: &mut ArenaWorld) {
        for i in 0..self.resources {
            let angle = TAU * i as f32 / self.resources as f32;
            let position = Vec2::from_angle(angle) * SPAWN_RADIUS;
            world.spawn_resource(position, Vec2::ZERO);
        }
        log::info!("spawned {} resources", self.resources);
    }

    fn steer<T: Transport>(
        &mut self,
        session: &mut NetworkSession<T>,
        world: &mut ArenaWorld,
        me: usize,
        target: Vec2,
        dt: Duration,
    ) {
        let Some(body) = world.player(me) else {
            return;
        };
        let mut motion = body.kinematics;
        let offset = target - motion.position;

        if offset.length() > LAUNCH_DISTANCE && motion.velocity.length() < 1.0 {
            world.launch(me, offset.normalize_or_zero() * SPEED * 2.0);
            if let Some(body) = world.player(me) {
                if let Err(err) = session.send_move(body.kinematics, true) {
                    log::warn!("launch not sent: {err}");
                }
            }
            self.since_drift_send = Duration::ZERO;
            return;
        }

        motion.velocity = offset.normalize_or_zero() * SPEED.min(offset.length() / dt.as_secs_f32().max(1e-3));
        world.set_motion(me, motion);

        self.since_drift_send += dt;
        if self.since_drift_send >= DRIFT_SEND_PERIOD {
            self.since_drift_send = Duration::ZERO;
            if let Err(err) = session.send_move_unreliable(motion) {
                log::debug!("drift not sent: {err}");
            }
        }
    }
}
