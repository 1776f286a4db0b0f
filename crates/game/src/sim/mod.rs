mod entity;
mod world;

pub use entity::{HAND_SLOTS, PlayerBody, ResourceBody};
pub use world::{ArenaWorld, WorldSettings};

use glam::Vec2;

use crate::net::{ElementSnapshot, Kinematics};

/// The local game simulation as seen by the session layer.
///
/// Indices are the session-assigned player indices and the spawn-order
/// resource indices. Resource slots are never reused, so `resource_count`
/// only grows.
pub trait Simulation {
    fn player_count(&self) -> usize;
    fn resource_count(&self) -> usize;

    /// `index < player_count()`.
    fn capture_player(&self, index: usize) -> ElementSnapshot;
    /// `index < resource_count()`.
    fn capture_resource(&self, index: usize) -> ElementSnapshot;

    fn apply_remote_move(&mut self, index: usize, motion: &Kinematics, was_launch: bool);
    /// Drops any panel/beam lock the player holds.
    fn release_occupancy(&mut self, index: usize);
    fn apply_snapshot_player(&mut self, index: usize, motion: &Kinematics);
    fn apply_snapshot_resource(&mut self, index: usize, motion: &Kinematics);
    /// Returns the new resource's index.
    fn spawn_resource(&mut self, position: Vec2, velocity: Vec2) -> usize;

    fn held_resources(&self, player: usize) -> Vec<usize>;
    /// Takes the resource from whoever holds it.
    fn grab_resource(&mut self, player: usize, resource: usize);
    fn release_resource(&mut self, player: usize, resource: usize);
    fn is_delivered(&self, resource: usize) -> bool;
    fn mark_delivered(&mut self, player: usize, resource: usize);

    /// Player index that has met the win condition, if any.
    fn winner(&self) -> Option<usize>;

    /// Moves the local simulation forward by `dt` seconds.
    fn advance(&mut self, dt: f32);

    fn on_session_started(&mut self, local_index: usize);
    fn on_game_over(&mut self, local_won: bool);
    fn on_disconnected(&mut self);
}
