//! Poll timing for the controller's wait loops.

use std::time::Duration;

/// Poll intervals and bounds used by the controller's wait loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause between checks while waiting for the listener port.
    pub start_interval: Duration,
    /// Number of checks before `start` gives up on the listener port.
    pub start_attempts: u32,
    /// Pause between checks while waiting for bootstrap.
    pub bootstrap_interval: Duration,
    /// How long `stop` waits for the run thread before abandoning it.
    pub stop_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            start_interval: Duration::from_millis(100),
            start_attempts: 100,
            bootstrap_interval: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl PollSettings {
    /// Total time `start` may spend waiting for the listener port.
    #[must_use]
    pub fn start_budget(&self) -> Duration {
        self.start_interval.saturating_mul(self.start_attempts)
    }
}
