mod codec;
mod envelope;
mod link;
mod loopback;
mod stats;
mod transport;

pub use codec::{EnvelopeCodec, WireElement, WireEnvelope, WireFormat, required_fields};
pub use envelope::{
    ElementSnapshot, Envelope, EnvelopeTag, Kinematics, MoveUpdate, SnapshotFrame,
};
pub use link::{LinkConditions, LinkSimulator};
pub use loopback::{LoopbackEnd, LoopbackLink, LoopbackTransport, MAX_PAYLOAD_SIZE};
pub use stats::NetworkStats;
pub use transport::{PeerId, Reliability, Transport, TransportError, TransportEvent};
