use glam::Vec2;

use crate::net::{ElementSnapshot, Kinematics};
use crate::session::SessionOutcome;

use super::Simulation;
use super::entity::{PlayerBody, ResourceBody};

#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub spawn_points: Vec<Vec2>,
    pub target_score: usize,
    pub deposit_center: Vec2,
    pub deposit_radius: f32,
    pub half_extent: f32,
    /// Per-second velocity decay.
    pub damping: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            spawn_points: vec![Vec2::new(-8.0, 0.0), Vec2::new(8.0, 0.0)],
            target_score: 3,
            deposit_center: Vec2::new(0.0, 12.0),
            deposit_radius: 2.5,
            half_extent: 20.0,
            damping: 0.6,
        }
    }
}

/// Reference two-player arena: players with two hands, resources that get
/// carried to a deposit zone, first to `target_score` deliveries wins.
#[derive(Debug)]
pub struct ArenaWorld {
    settings: WorldSettings,
    tick: u32,
    players: Vec<PlayerBody>,
    resources: Vec<ResourceBody>,
    started_as: Option<usize>,
    outcome: Option<SessionOutcome>,
}

impl ArenaWorld {
    pub fn new(settings: WorldSettings) -> Self {
        let players = settings
            .spawn_points
            .iter()
            .map(|&p| PlayerBody::spawn(p))
            .collect();
        Self {
            settings,
            tick: 0,
            players,
            resources: Vec::new(),
            started_as: None,
            outcome: None,
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn players(&self) -> &[PlayerBody] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [PlayerBody] {
        &mut self.players
    }

    pub fn player(&self, index: usize) -> Option<&PlayerBody> {
        self.players.get(index)
    }

    pub fn resources(&self) -> &[ResourceBody] {
        &self.resources
    }

    pub fn resource(&self, index: usize) -> Option<&ResourceBody> {
        self.resources.get(index)
    }

    pub fn active_resources(&self) -> usize {
        self.resources.iter().filter(|r| r.is_active()).count()
    }

    pub fn started_as(&self) -> Option<usize> {
        self.started_as
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn set_motion(&mut self, player: usize, motion: Kinematics) {
        if let Some(body) = self.players.get_mut(player) {
            body.kinematics = motion;
        }
    }

    /// Deliberate impulse; leaving a panel or beam frees it.
    pub fn launch(&mut self, player: usize, impulse: Vec2) {
        if let Some(body) = self.players.get_mut(player) {
            body.kinematics.velocity += impulse;
            body.occupancy = None;
        }
    }

    pub fn occupy(&mut self, player: usize, panel: u32) {
        if let Some(body) = self.players.get_mut(player) {
            body.occupancy = Some(panel);
        }
    }

    /// Local pickup: only a free resource, only into a free hand.
    pub fn grab(&mut self, player: usize, resource: usize) -> bool {
        let free = self.resources.get(resource).is_some_and(ResourceBody::is_free);
        let Some(body) = self.players.get_mut(player) else {
            return false;
        };
        if !free || !body.has_free_hand() {
            return false;
        }
        body.take(resource);
        self.resources[resource].holder = Some(player);
        true
    }

    pub fn release(&mut self, player: usize, resource: usize) -> bool {
        let Some(body) = self.players.get_mut(player) else {
            return false;
        };
        if !body.drop_resource(resource) {
            return false;
        }
        if let Some(r) = self.resources.get_mut(resource) {
            if r.holder == Some(player) {
                r.holder = None;
            }
        }
        true
    }

    pub fn in_deposit_zone(&self, player: usize) -> bool {
        self.players.get(player).is_some_and(|p| {
            p.kinematics.position.distance(self.settings.deposit_center) <= self.settings.deposit_radius
        })
    }

    /// Delivers a held resource from inside the deposit zone.
    pub fn deposit(&mut self, player: usize, resource: usize) -> bool {
        let holds = self.players.get(player).is_some_and(|p| p.holds(resource));
        if !holds || !self.in_deposit_zone(player) {
            return false;
        }
        self.mark_delivered(player, resource);
        true
    }

    pub fn nearest_free_resource(&self, from: Vec2) -> Option<usize> {
        self.resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_free())
            .min_by(|(_, a), (_, b)| {
                a.kinematics
                    .position
                    .distance_squared(from)
                    .total_cmp(&b.kinematics.position.distance_squared(from))
            })
            .map(|(i, _)| i)
    }

    pub fn step(&mut self, dt: f32) {
        let decay = (1.0 - self.settings.damping * dt).clamp(0.0, 1.0);
        let bound = self.settings.half_extent;

        for body in &mut self.players {
            integrate(&mut body.kinematics, dt, decay, bound);
        }

        for resource in &mut self.resources {
            if !resource.is_active() {
                continue;
            }
            match resource.holder.and_then(|p| self.players.get(p)) {
                Some(holder) => {
                    resource.kinematics.position = holder.kinematics.position;
                    resource.kinematics.velocity = holder.kinematics.velocity;
                }
                None => integrate(&mut resource.kinematics, dt, decay, bound),
            }
        }

        self.tick = self.tick.wrapping_add(1);
    }

    fn valid_pair(&self, player: usize, resource: usize) -> bool {
        if player >= self.players.len() || resource >= self.resources.len() {
            log::debug!("ignoring player {player} / resource {resource}: out of range");
            return false;
        }
        true
    }
}

fn integrate(k: &mut Kinematics, dt: f32, decay: f32, bound: f32) {
    k.position += k.velocity * dt;
    k.rotation += k.angular_velocity * dt;
    k.velocity *= decay;
    k.angular_velocity *= decay;

    for axis in 0..2 {
        if k.position[axis].abs() > bound {
            k.position[axis] = k.position[axis].clamp(-bound, bound);
            k.velocity[axis] = 0.0;
        }
    }
}

impl Simulation for ArenaWorld {
    fn player_count(&self) -> usize {
        self.players.len()
    }

    fn resource_count(&self) -> usize {
        self.resources.len()
    }

    fn capture_player(&self, index: usize) -> ElementSnapshot {
        self.players[index].to_snapshot()
    }

    fn capture_resource(&self, index: usize) -> ElementSnapshot {
        self.resources[index].to_snapshot()
    }

    fn apply_remote_move(&mut self, index: usize, motion: &Kinematics, _was_launch: bool) {
        self.set_motion(index, *motion);
    }

    fn release_occupancy(&mut self, index: usize) {
        if let Some(body) = self.players.get_mut(index) {
            body.occupancy = None;
        }
    }

    fn apply_snapshot_player(&mut self, index: usize, motion: &Kinematics) {
        self.set_motion(index, *motion);
    }

    fn apply_snapshot_resource(&mut self, index: usize, motion: &Kinematics) {
        if let Some(resource) = self.resources.get_mut(index) {
            if resource.is_active() {
                resource.kinematics = *motion;
            }
        }
    }

    fn spawn_resource(&mut self, position: Vec2, velocity: Vec2) -> usize {
        self.resources.push(ResourceBody::spawn(position, velocity));
        self.resources.len() - 1
    }

    fn held_resources(&self, player: usize) -> Vec<usize> {
        self.players
            .get(player)
            .map(PlayerBody::held)
            .unwrap_or_default()
    }

    fn grab_resource(&mut self, player: usize, resource: usize) {
        if !self.valid_pair(player, resource) || !self.resources[resource].is_active() {
            return;
        }
        if let Some(previous) = self.resources[resource].holder {
            if previous != player {
                self.players[previous].drop_resource(resource);
            }
        }
        let body = &mut self.players[player];
        if !body.take(resource) {
            // Claim wins over whatever this hand held locally.
            if let Some(dropped) = body.hands[0].replace(resource) {
                self.resources[dropped].holder = None;
            }
        }
        self.resources[resource].holder = Some(player);
    }

    fn release_resource(&mut self, player: usize, resource: usize) {
        self.release(player, resource);
    }

    fn is_delivered(&self, resource: usize) -> bool {
        self.resources
            .get(resource)
            .is_some_and(|r| !r.is_active())
    }

    fn mark_delivered(&mut self, player: usize, resource: usize) {
        if !self.valid_pair(player, resource) {
            return;
        }
        if let Some(holder) = self.resources[resource].holder.take() {
            self.players[holder].drop_resource(resource);
        }
        self.resources[resource].delivered_by = Some(player);
        self.players[player].delivered.insert(resource);
    }

    fn winner(&self) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.score() >= self.settings.target_score)
    }

    fn advance(&mut self, dt: f32) {
        self.step(dt);
    }

    fn on_session_started(&mut self, local_index: usize) {
        log::info!("playing as player {local_index}");
        self.started_as = Some(local_index);
    }

    fn on_game_over(&mut self, local_won: bool) {
        self.outcome = Some(SessionOutcome::GameOver { local_won });
    }

    fn on_disconnected(&mut self) {
        self.outcome = Some(SessionOutcome::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_resources(n: usize) -> ArenaWorld {
        let mut world = ArenaWorld::new(WorldSettings::default());
        for i in 0..n {
            world.spawn_resource(Vec2::new(i as f32, 0.0), Vec2::ZERO);
        }
        world
    }

    #[test]
    fn local_grab_respects_other_holder() {
        let mut world = world_with_resources(1);

        assert!(world.grab(0, 0));
        assert!(!world.grab(1, 0));
        assert_eq!(world.resource(0).unwrap().holder, Some(0));
    }

    #[test]
    fn forced_grab_steals() {
        let mut world = world_with_resources(1);
        world.grab(0, 0);

        world.grab_resource(1, 0);

        assert!(world.held_resources(0).is_empty());
        assert_eq!(world.held_resources(1), vec![0]);
        assert_eq!(world.resource(0).unwrap().holder, Some(1));
    }

    #[test]
    fn deposit_needs_zone() {
        let mut world = world_with_resources(1);
        world.grab(0, 0);

        assert!(!world.deposit(0, 0));

        let zone = world.settings().deposit_center;
        world.set_motion(0, Kinematics::at(zone));
        assert!(world.deposit(0, 0));
        assert!(world.is_delivered(0));
        assert_eq!(world.player(0).unwrap().score(), 1);
        assert!(world.held_resources(0).is_empty());
        assert_eq!(world.resource_count(), 1);
        assert_eq!(world.active_resources(), 0);
    }

    #[test]
    fn launch_frees_occupancy() {
        let mut world = world_with_resources(0);
        world.occupy(1, 3);

        world.launch(1, Vec2::new(0.0, 5.0));

        assert_eq!(world.player(1).unwrap().occupancy, None);
        assert_eq!(world.player(1).unwrap().kinematics.velocity, Vec2::new(0.0, 5.0));
    }

    #[test]
    fn held_resource_follows_holder() {
        let mut world = world_with_resources(1);
        world.grab(1, 0);
        world.set_motion(
            1,
            Kinematics {
                position: Vec2::new(1.0, 1.0),
                velocity: Vec2::new(10.0, 0.0),
                ..Default::default()
            },
        );

        world.step(0.1);

        let holder = world.player(1).unwrap().kinematics.position;
        assert_eq!(world.resource(0).unwrap().kinematics.position, holder);
        assert!((holder.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn winner_at_target_score() {
        let mut world = world_with_resources(3);
        assert_eq!(world.winner(), None);

        for r in 0..3 {
            world.mark_delivered(1, r);
        }
        assert_eq!(world.winner(), Some(1));
    }
}
