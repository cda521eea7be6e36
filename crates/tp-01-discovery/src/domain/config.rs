use std::time::Duration;

/// Timing parameters for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Interval between sweeps (re-advertise, heartbeat, expiry).
    pub heartbeat_interval: Duration,
    /// Missed heartbeats after which a silent peer is expired.
    pub silence_multiplier: u32,
    /// Upper bound on the sweep delay while broadcasts keep failing.
    pub max_backoff: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(1000),
            silence_multiplier: 3,
            max_backoff: Duration::from_millis(8000),
        }
    }
}

impl DiscoveryConfig {
    /// Silence after which a remote record is dropped.
    #[must_use]
    pub fn silence_timeout(&self) -> Duration {
        self.heartbeat_interval * self.silence_multiplier.max(1)
    }

    /// Sweep delay after `failures` consecutive failed broadcasts.
    #[must_use]
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
        self.heartbeat_interval
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_three_heartbeats() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.silence_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.backoff(0), Duration::from_millis(1000));
        assert_eq!(config.backoff(1), Duration::from_millis(2000));
        assert_eq!(config.backoff(2), Duration::from_millis(4000));
        assert_eq!(config.backoff(3), Duration::from_millis(8000));
        assert_eq!(config.backoff(10), Duration::from_millis(8000));
        assert_eq!(config.backoff(u32::MAX), Duration::from_millis(8000));
    }
}
