use crate::net::WireFormat;
use crate::session::DEFAULT_SNAPSHOT_RATE;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Peers besides ourselves that must report a number before election
    /// resolves.
    pub expected_peer_count: usize,
    pub snapshot_rate_hz: u32,
    /// Election draws are uniform over `[0, draw_upper_bound)`.
    pub draw_upper_bound: f64,
    pub wire_format: WireFormat,
    pub player_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expected_peer_count: 1,
            snapshot_rate_hz: DEFAULT_SNAPSHOT_RATE,
            draw_upper_bound: 1000.0,
            wire_format: WireFormat::Json,
            player_count: 2,
        }
    }
}

impl SessionConfig {
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }
}
