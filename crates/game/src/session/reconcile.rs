use std::ops::Range;

use crate::error::{IndexKind, SessionError};
use crate::net::{ElementSnapshot, MoveUpdate, SnapshotFrame};
use crate::sim::Simulation;

use super::state::IndexPair;

/// What one snapshot did to the local simulation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub players_applied: usize,
    pub resources_applied: usize,
    pub spawned: Range<usize>,
    pub released: usize,
    pub grabbed: usize,
    pub delivered: usize,
    /// Element references skipped as out of range.
    pub skipped: usize,
}

/// Folds remote `move` and `snapshot` data into the local simulation.
///
/// The local player is never written from remote data. Each remote player's
/// hands and delivered set are taken from that player's own broadcast, and
/// resource kinematics and spawns only flow from host to non-host.
#[derive(Debug, Clone, Copy)]
pub struct StateReconciler {
    indices: IndexPair,
}

impl StateReconciler {
    pub fn new(indices: IndexPair) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> IndexPair {
        self.indices
    }

    /// Returns `false` when the move targeted the local player and was
    /// ignored.
    pub fn apply_move<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        update: &MoveUpdate,
    ) -> Result<bool, SessionError> {
        let index = update.player_index;
        if index >= sim.player_count() {
            return Err(SessionError::IndexOutOfRange {
                kind: IndexKind::Player,
                index,
                len: sim.player_count(),
            });
        }
        if index == self.indices.local {
            log::warn!("ignoring move addressed to local player {index}");
            return Ok(false);
        }

        sim.apply_remote_move(index, &update.motion, update.was_launch);
        if update.was_launch {
            sim.release_occupancy(index);
        }
        Ok(true)
    }

    /// Applying the same frame twice leaves the simulation as after the
    /// first application. Out-of-range references are logged and skipped.
    pub fn apply_snapshot<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        frame: &SnapshotFrame,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let known = sim.resource_count();
        report.spawned = known..known;

        if let Some(resources) = &frame.resources {
            if self.indices.is_host() {
                log::debug!("host ignoring {} resources from peer", resources.len());
            } else {
                self.apply_resources(sim, resources, &mut report);
            }
        }

        for (index, element) in frame.players.iter().enumerate() {
            if index == self.indices.local {
                continue;
            }
            if index >= sim.player_count() {
                self.skip(
                    SessionError::IndexOutOfRange {
                        kind: IndexKind::Player,
                        index,
                        len: sim.player_count(),
                    },
                    &mut report,
                );
                continue;
            }

            sim.apply_snapshot_player(index, &element.kinematics);
            report.players_applied += 1;

            self.sync_hands(sim, index, element, &mut report);
            self.sync_delivered(sim, index, element, &mut report);
        }

        report
    }

    fn apply_resources<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        resources: &[ElementSnapshot],
        report: &mut ReconcileReport,
    ) {
        let known = sim.resource_count();
        for (index, element) in resources.iter().enumerate() {
            let motion = &element.kinematics;
            if index < known {
                sim.apply_snapshot_resource(index, motion);
                report.resources_applied += 1;
            } else {
                let spawned = sim.spawn_resource(motion.position, motion.velocity);
                log::debug!("spawned resource {spawned} from snapshot");
            }
        }
        report.spawned = known..sim.resource_count();
    }

    fn sync_hands<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        player: usize,
        element: &ElementSnapshot,
        report: &mut ReconcileReport,
    ) {
        let current = sim.held_resources(player);

        for &resource in current.iter().filter(|r| !element.held_indices.contains(r)) {
            sim.release_resource(player, resource);
            report.released += 1;
        }

        for &resource in element.held_indices.iter().filter(|r| !current.contains(r)) {
            if resource >= sim.resource_count() {
                self.skip(
                    SessionError::IndexOutOfRange {
                        kind: IndexKind::Resource,
                        index: resource,
                        len: sim.resource_count(),
                    },
                    report,
                );
                continue;
            }
            if sim.is_delivered(resource) {
                continue;
            }
            sim.grab_resource(player, resource);
            report.grabbed += 1;
        }
    }

    fn sync_delivered<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        player: usize,
        element: &ElementSnapshot,
        report: &mut ReconcileReport,
    ) {
        for &resource in &element.scored_indices {
            if resource >= sim.resource_count() {
                self.skip(
                    SessionError::IndexOutOfRange {
                        kind: IndexKind::Resource,
                        index: resource,
                        len: sim.resource_count(),
                    },
                    report,
                );
                continue;
            }
            if !sim.is_delivered(resource) {
                sim.mark_delivered(player, resource);
                report.delivered += 1;
            }
        }
    }

    fn skip(&self, err: SessionError, report: &mut ReconcileReport) {
        log::warn!("snapshot: {err}, skipped");
        report.skipped += 1;
    }
}
