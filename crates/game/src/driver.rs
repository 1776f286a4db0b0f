use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

use crate::net::{Transport, TransportEvent};
use crate::session::{NetworkSession, SessionOutcome};
use crate::sim::Simulation;

pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Why [`PeerDriver::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    Finished(SessionOutcome),
    Shutdown,
    InboxClosed,
}

/// Serialized execution context for one peer.
///
/// Transport events, broadcast ticks and simulation frames are all handled
/// on the task running [`PeerDriver::run`], one at a time, so nothing in the
/// session or the simulation is ever touched concurrently.
pub struct PeerDriver<T, S> {
    session: NetworkSession<T>,
    sim: S,
    inbox: UnboundedReceiver<TransportEvent>,
    frame_period: Duration,
}

impl<T: Transport, S: Simulation> PeerDriver<T, S> {
    pub fn new(session: NetworkSession<T>, sim: S, inbox: UnboundedReceiver<TransportEvent>) -> Self {
        Self {
            session,
            sim,
            inbox,
            frame_period: Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE as f64),
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_period = Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64);
        self
    }

    pub fn session(&self) -> &NetworkSession<T> {
        &self.session
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn into_parts(self) -> (NetworkSession<T>, S) {
        (self.session, self.sim)
    }

    /// Drives the session until it is done, `shutdown` resolves or the
    /// transport goes away. `gameplay` runs once per frame, before the
    /// simulation steps, and is where local input turns into sends.
    ///
    /// The session is closed on return.
    pub async fn run<G, F>(&mut self, mut gameplay: G, shutdown: F) -> DriverExit
    where
        G: FnMut(&mut NetworkSession<T>, &mut S, Duration),
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut broadcast = tokio::time::interval(self.session.broadcast_period());
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames = tokio::time::interval(self.frame_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        let exit = loop {
            if let Some(outcome) = self.session.outcome() {
                break DriverExit::Finished(outcome);
            }

            tokio::select! {
                _ = &mut shutdown => break DriverExit::Shutdown,
                event = self.inbox.recv() => match event {
                    Some(event) => self.session.handle_event(event, &mut self.sim),
                    None => break DriverExit::InboxClosed,
                },
                _ = broadcast.tick() => {
                    if let Err(err) = self.session.broadcast_snapshot(&self.sim) {
                        log::debug!("snapshot not sent: {err}");
                    }
                }
                _ = frames.tick() => {
                    let now = Instant::now();
                    let dt = now - last_frame;
                    last_frame = now;
                    run_frame(&mut self.session, &mut self.sim, &mut gameplay, now, dt);
                }
            }
        };

        self.session.close();
        log::debug!("{} driver exited: {exit:?}", self.session.local_peer());
        exit
    }
}

fn run_frame<T, S, G>(session: &mut NetworkSession<T>, sim: &mut S, gameplay: &mut G, now: Instant, dt: Duration)
where
    T: Transport,
    S: Simulation,
    G: FnMut(&mut NetworkSession<T>, &mut S, Duration),
{
    session.pump(now);
    gameplay(session, sim, dt);
    sim.advance(dt.as_secs_f32());
    if let Err(err) = session.check_win(sim) {
        log::warn!("win announcement failed: {err}");
    }
}
