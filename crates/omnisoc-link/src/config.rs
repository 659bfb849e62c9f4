use std::time::Duration;

/// Default liveness window.
pub const DEFAULT_TIMEOUT_PERIOD: Duration = Duration::from_millis(1000);

/// Configuration for a [`Link`](crate::Link) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// How long after the last good frame the link still counts as live.
    pub timeout_period: Duration,
    /// Discard stale inbound bytes once, right after the transport opens.
    pub resync_on_open: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            timeout_period: DEFAULT_TIMEOUT_PERIOD,
            resync_on_open: true,
        }
    }
}
