use std::time::Duration;

use crate::config::{ReconnectConfig, MIN_RECONNECT_DELAY_SECS};

/// Exponential backoff between reconnect attempts, with a floor and a cap.
///
/// The floor never drops below 8s so a failing link is not hammered.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        let base = cfg.min_delay_secs.max(MIN_RECONNECT_DELAY_SECS);
        Self {
            base_delay: Duration::from_secs(base),
            max_delay: Duration::from_secs(cfg.max_delay_secs.max(base)),
        }
    }

    /// Wait before the next attempt after `failures` consecutive failures.
    /// `failures` is 1-based; 0 means no wait.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        // base * 2^(failures-1), capped.
        let exp = 1u32 << failures.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_is_enforced() {
        let p = ReconnectPolicy::from_config(&ReconnectConfig {
            min_delay_secs: 1,
            max_delay_secs: 2,
        });
        assert_eq!(p.base_delay, Duration::from_secs(8));
        assert_eq!(p.max_delay, Duration::from_secs(8));
        assert_eq!(p.delay_after(5), Duration::from_secs(8));
    }

    #[test]
    fn grows_and_is_capped() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay_after(0), Duration::ZERO);
        assert_eq!(p.delay_after(1), Duration::from_secs(8));
        assert_eq!(p.delay_after(2), Duration::from_secs(16));
        assert_eq!(p.delay_after(3), Duration::from_secs(32));
        assert_eq!(p.delay_after(30), p.max_delay);
    }
}
