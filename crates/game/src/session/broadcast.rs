use std::time::Duration;

use crate::net::SnapshotFrame;
use crate::sim::Simulation;

pub const DEFAULT_SNAPSHOT_RATE: u32 = 30;

/// Fixed-period clock for snapshot sends, decoupled from the frame rate.
#[derive(Debug, Clone)]
pub struct BroadcastClock {
    rate_hz: u32,
    period: Duration,
    accumulator: Duration,
}

impl BroadcastClock {
    const MAX_CATCH_UP: Duration = Duration::from_millis(250);

    pub fn new(rate_hz: u32) -> Self {
        let rate_hz = rate_hz.max(1);
        Self {
            rate_hz,
            period: Duration::from_secs_f64(1.0 / rate_hz as f64),
            accumulator: Duration::ZERO,
        }
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulator += delta.min(Self::MAX_CATCH_UP);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.period {
            self.accumulator -= self.period;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

/// Periodic capture of the local view for the peer.
///
/// Disabled until the session goes active. Resource capture is switched on
/// separately, and only by the host, so a non-host never advertises spawn
/// state before the authoritative side is confirmed.
#[derive(Debug)]
pub struct SnapshotBroadcaster {
    clock: BroadcastClock,
    enabled: bool,
    include_resources: bool,
    stopped: bool,
}

impl SnapshotBroadcaster {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            clock: BroadcastClock::new(rate_hz),
            enabled: false,
            include_resources: false,
            stopped: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.clock.period()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.stopped
    }

    pub fn includes_resources(&self) -> bool {
        self.include_resources
    }

    pub fn enable(&mut self) {
        if self.stopped || self.enabled {
            return;
        }
        self.enabled = true;
        self.clock.reset();
        log::debug!("snapshot broadcast enabled at {} Hz", self.clock.rate_hz());
    }

    /// One-way switch.
    pub fn include_resources(&mut self) {
        if !self.include_resources {
            self.include_resources = true;
            log::debug!("snapshot broadcast now includes resources");
        }
    }

    /// Teardown. The broadcaster never fires again.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.enabled = false;
    }

    /// Number of broadcasts due after `delta` of wall time.
    pub fn advance(&mut self, delta: Duration) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        self.clock.accumulate(delta);
        let mut due = 0;
        while self.clock.consume_tick() {
            due += 1;
        }
        due
    }

    /// Players in index order, then resources if included.
    pub fn capture<S: Simulation + ?Sized>(&self, sim: &S, sender_index: usize) -> SnapshotFrame {
        let players = (0..sim.player_count())
            .map(|i| sim.capture_player(i))
            .collect();
        let resources = self.include_resources.then(|| {
            (0..sim.resource_count())
                .map(|i| sim.capture_resource(i))
                .collect()
        });
        SnapshotFrame {
            sender_index,
            players,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::sim::{ArenaWorld, WorldSettings};

    #[test]
    fn clock_ticks_at_rate() {
        let mut clock = BroadcastClock::new(30);

        clock.accumulate(Duration::from_millis(70));
        assert!(clock.consume_tick());
        assert!(clock.consume_tick());
        assert!(!clock.consume_tick());
    }

    #[test]
    fn disabled_broadcaster_never_due() {
        let mut broadcaster = SnapshotBroadcaster::new(30);
        assert_eq!(broadcaster.advance(Duration::from_secs(1)), 0);

        broadcaster.enable();
        assert_eq!(broadcaster.advance(Duration::from_millis(100)), 3);

        broadcaster.stop();
        broadcaster.enable();
        assert_eq!(broadcaster.advance(Duration::from_secs(1)), 0);
    }

    #[test]
    fn catch_up_is_bounded() {
        let mut broadcaster = SnapshotBroadcaster::new(30);
        broadcaster.enable();

        assert!(broadcaster.advance(Duration::from_secs(10)) <= 8);
    }

    #[test]
    fn capture_keeps_index_order_and_gates_resources() {
        let mut world = ArenaWorld::new(WorldSettings::default());
        world.players_mut()[0].kinematics.position = Vec2::new(1.0, 0.0);
        world.players_mut()[1].kinematics.position = Vec2::new(2.0, 0.0);
        world.spawn_resource(Vec2::new(5.0, 5.0), Vec2::ZERO);

        let mut broadcaster = SnapshotBroadcaster::new(30);
        let frame = broadcaster.capture(&world, 0);
        assert_eq!(frame.players.len(), 2);
        assert_eq!(frame.players[1].kinematics.position, Vec2::new(2.0, 0.0));
        assert!(frame.resources.is_none());

        broadcaster.include_resources();
        let frame = broadcaster.capture(&world, 0);
        assert_eq!(frame.resources.map(|r| r.len()), Some(1));
    }
}
