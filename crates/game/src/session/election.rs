//! Host election between two peers without a third party.
//!
//! Each peer draws a private number in `[0, upper)` and sends it to the
//! other. Whoever holds the larger number is host. Equal numbers are a tie:
//! both sides see the same collision, redraw and resend, so the exchange
//! repeats until the draws differ.
//!
//! A peer only sees a collision with a number we have actually sent. If the
//! peer's number matches ours before ours went out, only we know about the
//! tie, so we redraw away from it and keep the peer's value.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::net::PeerId;

pub trait DrawSource: Send {
    fn draw(&mut self) -> f64;
}

/// Uniform draws over `[0, upper)`.
#[derive(Debug)]
pub struct UniformDraw {
    rng: StdRng,
    upper: f64,
}

impl UniformDraw {
    pub fn new(upper: f64) -> Self {
        Self::with_rng(upper, StdRng::from_os_rng())
    }

    pub fn with_seed(upper: f64, seed: u64) -> Self {
        Self::with_rng(upper, StdRng::seed_from_u64(seed))
    }

    fn with_rng(upper: f64, rng: StdRng) -> Self {
        // An empty range would panic on the first draw.
        let upper = if upper.is_finite() && upper > 0.0 { upper } else { 1.0 };
        Self { rng, upper }
    }
}

impl DrawSource for UniformDraw {
    fn draw(&mut self) -> f64 {
        self.rng.random_range(0.0..self.upper)
    }
}

/// Replays fixed values, then falls back to uniform draws.
#[derive(Debug)]
pub struct ScriptedDraws {
    values: VecDeque<f64>,
    fallback: UniformDraw,
}

impl ScriptedDraws {
    pub fn new(values: impl IntoIterator<Item = f64>, upper: f64) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: UniformDraw::new(upper),
        }
    }
}

impl DrawSource for ScriptedDraws {
    fn draw(&mut self) -> f64 {
        self.values.pop_front().unwrap_or_else(|| self.fallback.draw())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub drawn_number: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElectionStep {
    /// Still missing a peer's number.
    Pending,
    /// The peer drew our number; we redrew and must resend.
    Tie { redrawn: f64 },
    /// Every expected peer is known and the ordering is frozen.
    Resolved { host: PeerId },
}

pub struct HostElection {
    local: PeerId,
    expected_peer_count: usize,
    records: Vec<PeerRecord>,
    draws: Box<dyn DrawSource>,
    ties: u32,
    announced: bool,
}

impl std::fmt::Debug for HostElection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostElection")
            .field("local", &self.local)
            .field("expected_peer_count", &self.expected_peer_count)
            .field("records", &self.records)
            .field("ties", &self.ties)
            .field("announced", &self.announced)
            .finish()
    }
}

impl HostElection {
    /// Draws the local number right away.
    pub fn new(local: PeerId, expected_peer_count: usize, mut draws: Box<dyn DrawSource>) -> Self {
        let drawn_number = draws.draw();
        Self {
            local,
            expected_peer_count,
            records: vec![PeerRecord {
                peer_id: local,
                drawn_number,
            }],
            draws,
            ties: 0,
            announced: false,
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    pub fn local_number(&self) -> f64 {
        self.record(self.local)
            .map(|r| r.drawn_number)
            .unwrap_or_default()
    }

    pub fn records(&self) -> &[PeerRecord] {
        &self.records
    }

    pub fn ties(&self) -> u32 {
        self.ties
    }

    /// Whether the current local number has reached the peer.
    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Call once the current local number has been handed to the transport.
    pub fn mark_announced(&mut self) {
        self.announced = true;
    }

    pub fn is_resolved(&self) -> bool {
        self.records.len() == self.expected_peer_count + 1
    }

    pub fn observe(&mut self, peer: PeerId, number: f64) -> ElectionStep {
        if self.is_resolved() {
            return self.status();
        }
        if peer == self.local {
            log::warn!("ignoring our own number echoed back");
            return self.status();
        }

        if number == self.local_number() {
            if self.announced {
                let redrawn = self.redraw();
                log::info!("tied with {peer} on {number}, redrew {redrawn}");
                return ElectionStep::Tie { redrawn };
            }
            let mut redrawn = self.redraw();
            while redrawn == number {
                redrawn = self.redraw();
            }
            log::info!("{peer} drew our unsent {number}, redrew {redrawn} and kept theirs");
        }

        match self.records.iter_mut().find(|r| r.peer_id == peer) {
            Some(record) => record.drawn_number = number,
            None => self.records.push(PeerRecord {
                peer_id: peer,
                drawn_number: number,
            }),
        }

        if self.is_resolved() {
            self.records
                .sort_by(|a, b| b.drawn_number.total_cmp(&a.drawn_number));
        }
        self.status()
    }

    pub fn status(&self) -> ElectionStep {
        match self.host() {
            Some(host) => ElectionStep::Resolved { host },
            None => ElectionStep::Pending,
        }
    }

    pub fn host(&self) -> Option<PeerId> {
        if self.is_resolved() {
            self.records.first().map(|r| r.peer_id)
        } else {
            None
        }
    }

    /// Position of `peer` in the frozen ordering; position 0 is host.
    pub fn position_of(&self, peer: PeerId) -> Option<usize> {
        if !self.is_resolved() {
            return None;
        }
        self.records.iter().position(|r| r.peer_id == peer)
    }

    pub fn local_is_host(&self) -> Option<bool> {
        self.host().map(|host| host == self.local)
    }

    fn record(&self, peer: PeerId) -> Option<&PeerRecord> {
        self.records.iter().find(|r| r.peer_id == peer)
    }

    fn redraw(&mut self) -> f64 {
        let number = self.draws.draw();
        self.ties += 1;
        self.announced = false;
        if let Some(record) = self.records.iter_mut().find(|r| r.peer_id == self.local) {
            record.drawn_number = number;
        }
        number
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const A: PeerId = PeerId(0xA);
    const B: PeerId = PeerId(0xB);

    fn election(peer: PeerId, draws: Vec<f64>) -> HostElection {
        HostElection::new(peer, 1, Box::new(ScriptedDraws::new(draws, 1000.0)))
    }

    /// Runs the symmetric exchange until both sides resolve; returns rounds.
    fn exchange(a: &mut HostElection, b: &mut HostElection, max_rounds: u32) -> u32 {
        let mut to_b = vec![a.local_number()];
        let mut to_a = vec![b.local_number()];
        a.mark_announced();
        b.mark_announced();
        let mut rounds = 0;

        while !(a.is_resolved() && b.is_resolved()) && rounds < max_rounds {
            rounds += 1;
            let inbound_a = std::mem::take(&mut to_a);
            let inbound_b = std::mem::take(&mut to_b);
            for number in inbound_a {
                if let ElectionStep::Tie { redrawn } = a.observe(B, number) {
                    to_b.push(redrawn);
                    a.mark_announced();
                }
            }
            for number in inbound_b {
                if let ElectionStep::Tie { redrawn } = b.observe(A, number) {
                    to_a.push(redrawn);
                    b.mark_announced();
                }
            }
        }
        rounds
    }

    #[test]
    fn larger_number_hosts() {
        let mut a = election(A, vec![812.4]);
        let mut b = election(B, vec![203.9]);

        assert_eq!(a.observe(B, 203.9), ElectionStep::Resolved { host: A });
        assert_eq!(b.observe(A, 812.4), ElectionStep::Resolved { host: A });
        assert_eq!(a.local_is_host(), Some(true));
        assert_eq!(b.local_is_host(), Some(false));
        assert_eq!(b.position_of(B), Some(1));
    }

    #[test]
    fn tie_redraws_without_recording_peer() {
        let mut a = election(A, vec![500.0, 640.0]);
        a.mark_announced();

        assert_eq!(a.observe(B, 500.0), ElectionStep::Tie { redrawn: 640.0 });
        assert_eq!(a.records().len(), 1);
        assert_eq!(a.local_number(), 640.0);
        assert!(!a.is_resolved());
        assert!(!a.is_announced());
        assert_eq!(a.ties(), 1);
    }

    #[test]
    fn tie_on_unsent_number_keeps_peer_value() {
        let mut a = election(A, vec![500.0, 500.0, 42.0]);

        assert_eq!(a.observe(B, 500.0), ElectionStep::Resolved { host: B });
        assert_eq!(a.local_number(), 42.0);
        assert_eq!(a.records()[0], PeerRecord { peer_id: B, drawn_number: 500.0 });
        assert!(!a.is_announced());
    }

    #[test]
    fn ordering_frozen_after_resolution() {
        let mut a = election(A, vec![10.0]);
        a.observe(B, 20.0);

        assert_eq!(a.observe(B, 1.0), ElectionStep::Resolved { host: B });
        assert_eq!(a.records()[0].drawn_number, 20.0);
    }

    #[test]
    fn repeated_ties_resolve() {
        let mut a = election(A, vec![1.0, 2.0, 3.0, 900.0]);
        let mut b = election(B, vec![1.0, 2.0, 3.0, 100.0]);

        let rounds = exchange(&mut a, &mut b, 16);

        assert!(a.is_resolved() && b.is_resolved());
        assert_eq!(a.ties(), 3);
        assert_eq!(b.ties(), 3);
        assert_eq!(a.host(), Some(A));
        assert_eq!(b.host(), Some(A));
        assert_eq!(rounds, 4);
    }

    #[test]
    fn seeded_draws_repeat_and_stay_in_range() {
        let mut a = UniformDraw::with_seed(1000.0, 9);
        let mut b = UniformDraw::with_seed(1000.0, 9);

        for _ in 0..100 {
            let x = a.draw();
            assert_eq!(x, b.draw());
            assert!((0.0..1000.0).contains(&x));
        }
        assert!(UniformDraw::with_seed(0.0, 1).draw() < 1.0);
    }

    proptest! {
        #[test]
        fn both_sides_agree_on_host(x in 0.0f64..1000.0, y in 0.0f64..1000.0) {
            prop_assume!(x != y);
            let mut a = election(A, vec![x]);
            let mut b = election(B, vec![y]);

            exchange(&mut a, &mut b, 4);

            let expected = if x > y { A } else { B };
            prop_assert_eq!(a.host(), Some(expected));
            prop_assert_eq!(b.host(), Some(expected));
        }

        #[test]
        fn n_ties_then_distinct_resolves(n in 0usize..8, x in 0.0f64..1000.0, y in 0.0f64..1000.0) {
            prop_assume!(x != y);
            let shared: Vec<f64> = (0..=n).map(|i| i as f64 * 7.5).collect();
            let mut a_draws = shared.clone();
            a_draws.push(x);
            let mut b_draws = shared;
            b_draws.push(y);
            let mut a = election(A, a_draws);
            let mut b = election(B, b_draws);

            let rounds = exchange(&mut a, &mut b, 64);

            prop_assert!(a.is_resolved() && b.is_resolved());
            prop_assert_eq!(a.host(), b.host());
            prop_assert_eq!(rounds as usize, n + 2);
        }
    }
}
