use std::time::Duration;

use arena::{DEFAULT_FRAME_RATE, LinkConditions, WireFormat};

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub link: LinkConditions,
    pub wire_format: WireFormat,
    pub target_score: usize,
    pub resources: usize,
    pub max_duration: Duration,
    pub frame_rate: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            link: LinkConditions::default(),
            wire_format: WireFormat::Json,
            target_score: 3,
            resources: 8,
            max_duration: Duration::from_secs(60),
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}
