use glam::Vec2;

use super::transport::Reliability;

/// Rigid-body state of one player or resource.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub position: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
}

impl Kinematics {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// One tracked element inside a snapshot group.
///
/// For players, `held_indices` lists the resources in its hands (at most two)
/// and `scored_indices` the resources it has delivered. Resources leave both
/// lists empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementSnapshot {
    pub kinematics: Kinematics,
    pub held_indices: Vec<usize>,
    pub scored_indices: Vec<usize>,
}

impl ElementSnapshot {
    pub fn from_kinematics(kinematics: Kinematics) -> Self {
        Self {
            kinematics,
            held_indices: Vec::new(),
            scored_indices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeTag {
    RandomNumber,
    GameBegin,
    Move,
    GameOver,
    Snapshot,
}

impl EnvelopeTag {
    pub const ALL: [EnvelopeTag; 5] = [
        EnvelopeTag::RandomNumber,
        EnvelopeTag::GameBegin,
        EnvelopeTag::Move,
        EnvelopeTag::GameOver,
        EnvelopeTag::Snapshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomNumber => "randomNumber",
            Self::GameBegin => "gameBegin",
            Self::Move => "move",
            Self::GameOver => "gameOver",
            Self::Snapshot => "snapshot",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Delivery mode used when the caller does not pick one explicitly.
    pub fn default_reliability(&self) -> Reliability {
        match self {
            Self::RandomNumber => Reliability::Reliable,
            Self::GameBegin => Reliability::Reliable,
            Self::Move => Reliability::Reliable,
            Self::GameOver => Reliability::Reliable,

            // A resent snapshot would overwrite newer state on the peer.
            Self::Snapshot => Reliability::BestEffort,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveUpdate {
    pub player_index: usize,
    pub motion: Kinematics,
    /// Deliberate launch impulse rather than continuous drift.
    pub was_launch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFrame {
    pub sender_index: usize,
    pub players: Vec<ElementSnapshot>,
    /// Absent until the host enables resource broadcasting.
    pub resources: Option<Vec<ElementSnapshot>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    RandomNumber { value: f64 },
    GameBegin,
    Move(MoveUpdate),
    GameOver { host_won: bool },
    Snapshot(SnapshotFrame),
}

impl Envelope {
    pub fn tag(&self) -> EnvelopeTag {
        match self {
            Envelope::RandomNumber { .. } => EnvelopeTag::RandomNumber,
            Envelope::GameBegin => EnvelopeTag::GameBegin,
            Envelope::Move(_) => EnvelopeTag::Move,
            Envelope::GameOver { .. } => EnvelopeTag::GameOver,
            Envelope::Snapshot(_) => EnvelopeTag::Snapshot,
        }
    }
}
