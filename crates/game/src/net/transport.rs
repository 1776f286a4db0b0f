use std::fmt;
use std::time::Instant;

/// Opaque identity of one end of a two-peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl PeerId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// Delivered at least once, in send order.
    Reliable,
    /// May be dropped or reordered.
    BestEffort,
}

impl Reliability {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no peer connected")]
    NotConnected,
    #[error("transport closed")]
    Closed,
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Everything a transport reports asynchronously. Implementations push these
/// into the channel drained by the owning [`crate::PeerDriver`], so handlers
/// only ever run on the driver's task.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Received { payload: Vec<u8>, from: PeerId },
}

/// Point-to-point channel to exactly one other peer.
pub trait Transport {
    /// Fire-and-forget send; failures are reported, never waited on.
    fn send(&mut self, payload: Vec<u8>, reliability: Reliability) -> Result<(), TransportError>;

    /// Flush anything buffered whose delivery time has come.
    fn pump(&mut self, _now: Instant) {}

    /// Detach from the link. Later sends fail with [`TransportError::Closed`].
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: Vec<u8>, reliability: Reliability) -> Result<(), TransportError> {
        (**self).send(payload, reliability)
    }

    fn pump(&mut self, now: Instant) {
        (**self).pump(now)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
