#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub envelopes_sent: u64,
    pub envelopes_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub snapshots_sent: u64,
    pub snapshots_applied: u64,
    pub decode_failures: u64,
    pub dropped_for_state: u64,
    pub send_failures: u64,
}

impl NetworkStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.envelopes_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.envelopes_received += 1;
        self.bytes_received += bytes as u64;
    }
}
