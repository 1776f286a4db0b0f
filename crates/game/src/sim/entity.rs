use std::collections::BTreeSet;

use glam::Vec2;

use crate::net::{ElementSnapshot, Kinematics};

pub const HAND_SLOTS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerBody {
    pub kinematics: Kinematics,
    pub hands: [Option<usize>; HAND_SLOTS],
    /// Panel or beam this player currently locks.
    pub occupancy: Option<u32>,
    pub delivered: BTreeSet<usize>,
}

impl PlayerBody {
    pub fn spawn(position: Vec2) -> Self {
        Self {
            kinematics: Kinematics::at(position),
            ..Default::default()
        }
    }

    pub fn held(&self) -> Vec<usize> {
        self.hands.iter().flatten().copied().collect()
    }

    pub fn holds(&self, resource: usize) -> bool {
        self.hands.contains(&Some(resource))
    }

    pub fn has_free_hand(&self) -> bool {
        self.hands.iter().any(Option::is_none)
    }

    /// Puts the resource in the first free hand.
    pub fn take(&mut self, resource: usize) -> bool {
        if self.holds(resource) {
            return true;
        }
        match self.hands.iter_mut().find(|h| h.is_none()) {
            Some(hand) => {
                *hand = Some(resource);
                true
            }
            None => false,
        }
    }

    pub fn drop_resource(&mut self, resource: usize) -> bool {
        match self.hands.iter_mut().find(|h| **h == Some(resource)) {
            Some(hand) => {
                *hand = None;
                true
            }
            None => false,
        }
    }

    pub fn score(&self) -> usize {
        self.delivered.len()
    }

    pub fn to_snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            kinematics: self.kinematics,
            held_indices: self.held(),
            scored_indices: self.delivered.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceBody {
    pub kinematics: Kinematics,
    pub holder: Option<usize>,
    pub delivered_by: Option<usize>,
}

impl ResourceBody {
    pub fn spawn(position: Vec2, velocity: Vec2) -> Self {
        Self {
            kinematics: Kinematics {
                position,
                velocity,
                ..Default::default()
            },
            holder: None,
            delivered_by: None,
        }
    }

    /// Still in play: not yet delivered.
    pub fn is_active(&self) -> bool {
        self.delivered_by.is_none()
    }

    pub fn is_free(&self) -> bool {
        self.is_active() && self.holder.is_none()
    }

    pub fn to_snapshot(&self) -> ElementSnapshot {
        ElementSnapshot::from_kinematics(self.kinematics)
    }
}
