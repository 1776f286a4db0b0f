pub mod config;
pub mod driver;
pub mod error;
pub mod net;
pub mod session;
pub mod sim;

pub use config::SessionConfig;
pub use driver::{DEFAULT_FRAME_RATE, DriverExit, PeerDriver};
pub use error::{DecodeError, EncodeError, IndexKind, SessionError};
pub use net::{
    ElementSnapshot, Envelope, EnvelopeCodec, EnvelopeTag, Kinematics, LinkConditions,
    LinkSimulator, LoopbackEnd, LoopbackLink, LoopbackTransport, MAX_PAYLOAD_SIZE, MoveUpdate,
    NetworkStats, PeerId, Reliability, SnapshotFrame, Transport, TransportError, TransportEvent,
    WireEnvelope, WireFormat,
};
pub use session::{
    BroadcastClock, DEFAULT_SNAPSHOT_RATE, DrawSource, ElectionStep, HostElection, IndexPair,
    NetworkSession, PeerRecord, ReconcileReport, ScriptedDraws, SessionOutcome, SessionState,
    SnapshotBroadcaster, StateReconciler, UniformDraw,
};
pub use sim::{ArenaWorld, HAND_SLOTS, PlayerBody, ResourceBody, Simulation, WorldSettings};
