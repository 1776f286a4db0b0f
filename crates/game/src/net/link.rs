use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::binary_heap::PeekMut;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::transport::Reliability;

/// Simulated link quality. Loss only ever hits best-effort payloads; reliable
/// payloads are delayed but always arrive, in order.
#[derive(Debug, Clone, Default)]
pub struct LinkConditions {
    pub enabled: bool,
    /// 0-100.
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl LinkConditions {
    pub fn lossy(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
            ..Default::default()
        }
    }

    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.random::<f32>() * 100.0 < self.loss_percent
    }

    pub fn delay(&self, rng: &mut impl Rng) -> Duration {
        if !self.enabled || self.max_latency_ms == 0 {
            return Duration::ZERO;
        }
        let base = self.min_latency_ms.min(self.max_latency_ms);
        let range = self.max_latency_ms - base;
        let spread = if range > 0 { rng.random_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.random_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(u64::from(base + spread + jitter))
    }
}

#[derive(Debug)]
struct DelayedPayload {
    release_time: Instant,
    order: u64,
    payload: Vec<u8>,
}

impl PartialEq for DelayedPayload {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedPayload {}

impl PartialOrd for DelayedPayload {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPayload {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; FIFO among equal release times.
        (other.release_time, other.order).cmp(&(self.release_time, self.order))
    }
}

/// One direction of a simulated link: holds payloads until their release time.
#[derive(Debug)]
pub struct LinkSimulator {
    conditions: LinkConditions,
    queue: BinaryHeap<DelayedPayload>,
    next_order: u64,
    last_reliable_release: Option<Instant>,
    dropped: u64,
    rng: StdRng,
}

impl LinkSimulator {
    pub fn new(conditions: LinkConditions) -> Self {
        Self::with_rng(conditions, StdRng::from_os_rng())
    }

    pub fn with_seed(conditions: LinkConditions, seed: u64) -> Self {
        Self::with_rng(conditions, StdRng::seed_from_u64(seed))
    }

    fn with_rng(conditions: LinkConditions, rng: StdRng) -> Self {
        Self {
            conditions,
            queue: BinaryHeap::new(),
            next_order: 0,
            last_reliable_release: None,
            dropped: 0,
            rng,
        }
    }

    pub fn conditions(&self) -> &LinkConditions {
        &self.conditions
    }

    /// Returns `false` when the payload was lost.
    pub fn enqueue(&mut self, payload: Vec<u8>, reliability: Reliability, now: Instant) -> bool {
        if !reliability.is_reliable() && self.conditions.should_drop(&mut self.rng) {
            self.dropped += 1;
            return false;
        }

        let mut release_time = now + self.conditions.delay(&mut self.rng);
        if reliability.is_reliable() {
            if let Some(last) = self.last_reliable_release {
                release_time = release_time.max(last);
            }
            self.last_reliable_release = Some(release_time);
        }

        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(DelayedPayload {
            release_time,
            order,
            payload,
        });
        true
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while let Some(next) = self.queue.peek_mut() {
            if next.release_time > now {
                break;
            }
            due.push(PeekMut::pop(next).payload);
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Everything still queued, in release order, regardless of time.
    pub fn drain_all(&mut self) -> Vec<Vec<u8>> {
        let mut rest = Vec::with_capacity(self.queue.len());
        while let Some(next) = self.queue.pop() {
            rest.push(next.payload);
        }
        rest
    }
}
