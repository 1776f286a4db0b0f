use glam::Vec2;
use rkyv::rancor;
use rkyv::util::AlignedVec;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

use super::envelope::{ElementSnapshot, Envelope, EnvelopeTag, Kinematics, MoveUpdate, SnapshotFrame};

/// Wire field names each tag must carry.
pub fn required_fields(tag: EnvelopeTag) -> &'static [&'static str] {
    match tag {
        EnvelopeTag::RandomNumber => &["randomNumber"],
        EnvelopeTag::GameBegin => &[],
        EnvelopeTag::Move => &["playerIndex", "boolValue", "elements"],
        EnvelopeTag::GameOver => &["boolValue"],
        EnvelopeTag::Snapshot => &["senderIndex", "elements"],
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct WireElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<f32>,
    /// Player entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_indices: Option<Vec<u32>>,
    /// Player entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored_indices: Option<Vec<u32>>,
}

/// What an element describes; decides which element fields are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementRole {
    Motion,
    Player,
    Resource,
}

impl ElementRole {
    fn carries_hands(self) -> bool {
        self == Self::Player
    }
}

/// Flat tagged object as it travels: `{"type": tag, ...optional fields}`.
///
/// Every payload field is optional here; [`WireEnvelope::into_envelope`] is
/// the only way to get an [`Envelope`] out of it and rejects a tag whose
/// required fields are absent.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_number: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    /// Accepted for compatibility; no current tag reads it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Vec<WireElement>>>,
}

impl WireEnvelope {
    fn tagged(tag: EnvelopeTag) -> Self {
        Self {
            tag: tag.as_str().to_owned(),
            ..Default::default()
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, EncodeError> {
        let tag = envelope.tag();
        let mut wire = Self::tagged(tag);

        match envelope {
            Envelope::RandomNumber { value } => {
                if !value.is_finite() {
                    return Err(EncodeError::NonFinite {
                        tag: tag.as_str(),
                        field: "randomNumber",
                    });
                }
                wire.random_number = Some(*value);
            }
            Envelope::GameBegin => {}
            Envelope::Move(update) => {
                let element = element_to_wire(tag, ElementRole::Motion, &ElementSnapshot::from_kinematics(update.motion))?;
                wire.player_index = Some(update.player_index as u32);
                wire.bool_value = Some(update.was_launch);
                wire.elements = Some(vec![vec![element]]);
            }
            Envelope::GameOver { host_won } => {
                wire.bool_value = Some(*host_won);
            }
            Envelope::Snapshot(frame) => {
                let mut groups = vec![group_to_wire(tag, ElementRole::Player, &frame.players)?];
                if let Some(resources) = &frame.resources {
                    groups.push(group_to_wire(tag, ElementRole::Resource, resources)?);
                }
                wire.sender_index = Some(frame.sender_index as u32);
                wire.elements = Some(groups);
            }
        }

        Ok(wire)
    }

    pub fn into_envelope(self) -> Result<Envelope, DecodeError> {
        let tag = EnvelopeTag::parse(&self.tag).ok_or(DecodeError::UnknownTag(self.tag))?;
        let name = tag.as_str();

        match tag {
            EnvelopeTag::RandomNumber => {
                let value = require(name, "randomNumber", self.random_number)?;
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid(name, "randomNumber", format!("{value} is not a draw")));
                }
                Ok(Envelope::RandomNumber { value })
            }
            EnvelopeTag::GameBegin => Ok(Envelope::GameBegin),
            EnvelopeTag::Move => {
                let player_index = require(name, "playerIndex", self.player_index)? as usize;
                let was_launch = require(name, "boolValue", self.bool_value)?;
                let groups = require(name, "elements", self.elements)?;
                let element = match <[Vec<WireElement>; 1]>::try_from(groups) {
                    Ok([group]) if group.len() == 1 => group.into_iter().next(),
                    _ => None,
                }
                .ok_or_else(|| invalid(name, "elements", "expected exactly one element".into()))?;
                let motion = element_from_wire(name, ElementRole::Motion, element)?.kinematics;
                Ok(Envelope::Move(MoveUpdate {
                    player_index,
                    motion,
                    was_launch,
                }))
            }
            EnvelopeTag::GameOver => {
                let host_won = require(name, "boolValue", self.bool_value)?;
                Ok(Envelope::GameOver { host_won })
            }
            EnvelopeTag::Snapshot => {
                let sender_index = require(name, "senderIndex", self.sender_index)? as usize;
                let groups = require(name, "elements", self.elements)?;
                if groups.is_empty() || groups.len() > 2 {
                    return Err(invalid(
                        name,
                        "elements",
                        format!("expected 1 or 2 groups, got {}", groups.len()),
                    ));
                }
                let mut groups = groups.into_iter();
                let players = groups
                    .next()
                    .map(|group| group_from_wire(name, ElementRole::Player, group))
                    .transpose()?
                    .unwrap_or_default();
                let resources = groups
                    .next()
                    .map(|group| group_from_wire(name, ElementRole::Resource, group))
                    .transpose()?;
                Ok(Envelope::Snapshot(SnapshotFrame {
                    sender_index,
                    players,
                    resources,
                }))
            }
        }
    }
}

fn require<T>(tag: &'static str, field: &'static str, value: Option<T>) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingRequiredField { tag, field })
}

fn invalid(tag: &'static str, field: &'static str, reason: String) -> DecodeError {
    DecodeError::InvalidField { tag, field, reason }
}

fn element_to_wire(
    tag: EnvelopeTag,
    role: ElementRole,
    element: &ElementSnapshot,
) -> Result<WireElement, EncodeError> {
    if !element.kinematics.is_finite() {
        return Err(EncodeError::NonFinite {
            tag: tag.as_str(),
            field: "elements",
        });
    }
    let k = &element.kinematics;
    let indices = |list: &[usize]| list.iter().map(|&i| i as u32).collect::<Vec<_>>();
    Ok(WireElement {
        position: Some(k.position.into()),
        rotation: Some(k.rotation),
        velocity: Some(k.velocity.into()),
        angular_velocity: Some(k.angular_velocity),
        held_indices: role.carries_hands().then(|| indices(&element.held_indices)),
        scored_indices: role.carries_hands().then(|| indices(&element.scored_indices)),
    })
}

fn group_to_wire(
    tag: EnvelopeTag,
    role: ElementRole,
    group: &[ElementSnapshot],
) -> Result<Vec<WireElement>, EncodeError> {
    group.iter().map(|e| element_to_wire(tag, role, e)).collect()
}

fn element_from_wire(
    tag: &'static str,
    role: ElementRole,
    wire: WireElement,
) -> Result<ElementSnapshot, DecodeError> {
    let kinematics = Kinematics {
        position: Vec2::from(require(tag, "position", wire.position)?),
        rotation: require(tag, "rotation", wire.rotation)?,
        velocity: Vec2::from(require(tag, "velocity", wire.velocity)?),
        angular_velocity: require(tag, "angularVelocity", wire.angular_velocity)?,
    };
    if !kinematics.is_finite() {
        return Err(invalid(tag, "elements", "non-finite kinematics".into()));
    }
    if !role.carries_hands() {
        return Ok(ElementSnapshot::from_kinematics(kinematics));
    }

    // An absent hand list would read as "holds nothing" and release resources.
    let held = require(tag, "heldIndices", wire.held_indices)?;
    let scored = require(tag, "scoredIndices", wire.scored_indices)?;
    if held.len() > 2 {
        return Err(invalid(
            tag,
            "heldIndices",
            format!("{} held indices for two hands", held.len()),
        ));
    }
    Ok(ElementSnapshot {
        kinematics,
        held_indices: held.into_iter().map(|i| i as usize).collect(),
        scored_indices: scored.into_iter().map(|i| i as usize).collect(),
    })
}

fn group_from_wire(
    tag: &'static str,
    role: ElementRole,
    group: Vec<WireElement>,
) -> Result<Vec<ElementSnapshot>, DecodeError> {
    group.into_iter().map(|e| element_from_wire(tag, role, e)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Tagged JSON object.
    #[default]
    Json,
    /// rkyv archive of the same flat wire struct.
    Binary,
}

/// Encodes and decodes envelopes in one [`WireFormat`]. Both peers of a
/// session must use the same format.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec {
    format: WireFormat,
}

impl EnvelopeCodec {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, EncodeError> {
        let wire = WireEnvelope::from_envelope(envelope)?;
        self.encode_wire(&wire)
    }

    pub fn encode_wire(&self, wire: &WireEnvelope) -> Result<Vec<u8>, EncodeError> {
        match self.format {
            WireFormat::Json => Ok(serde_json::to_vec(wire)?),
            WireFormat::Binary => rkyv::to_bytes::<rancor::Error>(wire)
                .map(|aligned| aligned.into_vec())
                .map_err(EncodeError::Binary),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, DecodeError> {
        let wire = match self.format {
            WireFormat::Json => serde_json::from_slice::<WireEnvelope>(bytes)?,
            WireFormat::Binary => {
                // Archives must be read from aligned memory.
                let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
                aligned.extend_from_slice(bytes);
                rkyv::from_bytes::<WireEnvelope, rancor::Error>(&aligned[..])
                    .map_err(DecodeError::Binary)?
            }
        };
        wire.into_envelope()
    }
}
