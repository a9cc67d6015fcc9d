use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-session settings, replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Token presented to every server the session logs in on.
    pub token: String,
    /// How often the session measures its latency to the current server.
    pub latency_interval_ms: u64,
}

impl Options {
    pub fn latency_interval(&self) -> Duration {
        // A zero period would make the probe spin.
        Duration::from_millis(self.latency_interval_ms.max(1))
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: String::new(),
            latency_interval_ms: 3000,
        }
    }
}
