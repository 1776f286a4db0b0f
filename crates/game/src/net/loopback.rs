use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::link::{LinkConditions, LinkSimulator};
use super::transport::{PeerId, Reliability, Transport, TransportError, TransportEvent};

pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
}

/// In-process link between exactly two peers.
///
/// Owns nothing but the connection flag and both event channels; each
/// direction's delay queue lives in the sending [`LoopbackTransport`].
#[derive(Debug, Clone)]
pub struct LoopbackLink {
    state: Arc<Mutex<LinkState>>,
    a: (PeerId, UnboundedSender<TransportEvent>),
    b: (PeerId, UnboundedSender<TransportEvent>),
}

/// One end of a [`LoopbackLink`].
pub struct LoopbackEnd {
    pub peer: PeerId,
    pub transport: LoopbackTransport,
    pub events: UnboundedReceiver<TransportEvent>,
}

impl LoopbackLink {
    pub fn pair(conditions: LinkConditions) -> (Self, LoopbackEnd, LoopbackEnd) {
        Self::pair_with_ids(PeerId::random(), PeerId::random(), conditions)
    }

    pub fn pair_with_ids(
        a: PeerId,
        b: PeerId,
        conditions: LinkConditions,
    ) -> (Self, LoopbackEnd, LoopbackEnd) {
        let state = Arc::new(Mutex::new(LinkState::default()));
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let end_a = LoopbackEnd {
            peer: a,
            transport: LoopbackTransport::new(a, b, conditions.clone(), b_tx.clone(), Arc::clone(&state)),
            events: a_rx,
        };
        let end_b = LoopbackEnd {
            peer: b,
            transport: LoopbackTransport::new(b, a, conditions, a_tx.clone(), Arc::clone(&state)),
            events: b_rx,
        };

        let link = Self {
            state,
            a: (a, a_tx),
            b: (b, b_tx),
        };
        (link, end_a, end_b)
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Reports `Connected` to both ends.
    pub fn connect(&self) {
        let mut state = self.state.lock();
        if state.connected {
            return;
        }
        state.connected = true;
        let _ = self.a.1.send(TransportEvent::Connected(self.b.0));
        let _ = self.b.1.send(TransportEvent::Connected(self.a.0));
    }

    /// Reports `Disconnected` to both ends; later sends fail.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        if !state.connected {
            return;
        }
        state.connected = false;
        let _ = self.a.1.send(TransportEvent::Disconnected(self.b.0));
        let _ = self.b.1.send(TransportEvent::Disconnected(self.a.0));
    }
}

pub struct LoopbackTransport {
    local: PeerId,
    remote: PeerId,
    outbound: LinkSimulator,
    to_remote: UnboundedSender<TransportEvent>,
    state: Arc<Mutex<LinkState>>,
    closed: bool,
}

impl LoopbackTransport {
    fn new(
        local: PeerId,
        remote: PeerId,
        conditions: LinkConditions,
        to_remote: UnboundedSender<TransportEvent>,
        state: Arc<Mutex<LinkState>>,
    ) -> Self {
        Self {
            local,
            remote,
            outbound: LinkSimulator::new(conditions),
            to_remote,
            state,
            closed: false,
        }
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn dropped(&self) -> u64 {
        self.outbound.dropped()
    }

    fn deliver(&self, payloads: Vec<Vec<u8>>) {
        for payload in payloads {
            let event = TransportEvent::Received {
                payload,
                from: self.local,
            };
            if self.to_remote.send(event).is_err() {
                log::debug!("{} is gone, discarding payload from {}", self.remote, self.local);
                return;
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, payload: Vec<u8>, reliability: Reliability) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.state.lock().connected {
            return Err(TransportError::NotConnected);
        }
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let now = Instant::now();
        if !self.outbound.enqueue(payload, reliability, now) {
            log::trace!("link dropped best-effort payload {} -> {}", self.local, self.remote);
        }
        self.pump(now);
        Ok(())
    }

    fn pump(&mut self, now: Instant) {
        let due = self.outbound.take_due(now);
        self.deliver(due);
    }

    /// Flushes whatever is still queued, then tells the other end this side
    /// went away.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let rest = self.outbound.drain_all();
        self.deliver(rest);

        let mut state = self.state.lock();
        if state.connected {
            state.connected = false;
            let _ = self.to_remote.send(TransportEvent::Disconnected(self.local));
        }
    }
}
