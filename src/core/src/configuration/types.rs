use std::time::Duration;

/// Tunables consumed by the session controller when reconciling snapshots.
#[derive(Debug, PartialEq, Clone)]
pub struct ReconcilePolicy {
    /// Period of the status poll.
    pub poll_interval: Duration,
    /// Local countdown is overwritten only when it drifts further than this.
    pub drift_tolerance_secs: u64,
    /// Consecutive "not running" snapshots tolerated while `Running` before
    /// the session is declared ended. `None` keeps polling forever.
    pub max_consecutive_misses: Option<u32>,
    /// Issue a best-effort stop call when logging out.
    pub stop_on_logout: bool,
    pub notifications_enabled: bool,
    /// Quota assumed when the profile does not advertise one.
    pub default_max_viewers: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            drift_tolerance_secs: 2,
            max_consecutive_misses: None,
            stop_on_logout: false,
            notifications_enabled: true,
            default_max_viewers: 100,
        }
    }
}
