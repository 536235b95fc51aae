//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RestartBackoffConfig;

/// Restart delay schedule: `min * 2^(restart-1)`, capped at `max`, then jittered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartBackoff {
    min: Duration,
    max: Duration,
    jitter: f64,
}

impl RestartBackoff {
    pub fn new(min: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &RestartBackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_ms),
            Duration::from_millis(config.max_ms),
            config.jitter,
        )
    }

    /// Delay before the given restart (1-based), without jitter.
    pub fn base_delay(&self, restart: u32) -> Duration {
        if restart == 0 {
            return Duration::ZERO;
        }

        let exponential_base = 2u32.saturating_pow(restart - 1);
        self.min.saturating_mul(exponential_base).min(self.max)
    }

    /// Delay before the given restart with jitter applied.
    ///
    /// The random factor is uniform in `[1 - jitter, 1 + jitter]` and applies
    /// after the cap.
    pub fn delay(&self, restart: u32) -> Duration {
        let base = self.base_delay(restart);
        if base.is_zero() || self.jitter == 0.0 {
            return base;
        }

        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        base.mul_f64(factor)
    }

    /// Bounds `delay(restart)` can take.
    pub fn bounds(&self, restart: u32) -> (Duration, Duration) {
        let base = self.base_delay(restart);
        (base.mul_f64(1.0 - self.jitter), base.mul_f64(1.0 + self.jitter))
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::from_config(&RestartBackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let backoff = RestartBackoff::default();
        let secs: Vec<u64> = (1..=6).map(|r| backoff.base_delay(r).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 10, 10]);
        assert_eq!(backoff.base_delay(0), Duration::ZERO);
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(10));
    }

    fn within(delay: Duration, low_ms: u64, high_ms: u64) -> bool {
        // One millisecond of slack for float rounding in `mul_f64`.
        delay + Duration::from_millis(1) >= Duration::from_millis(low_ms)
            && delay <= Duration::from_millis(high_ms + 1)
    }

    #[test]
    fn test_jitter_within_twenty_percent() {
        let backoff = RestartBackoff::default();
        for _ in 0..500 {
            assert!(within(backoff.delay(1), 800, 1200));
            assert!(within(backoff.delay(2), 1600, 2400));
            assert!(within(backoff.delay(20), 8000, 12_000));
        }
    }

    #[test]
    fn test_no_jitter_is_exact() {
        let backoff =
            RestartBackoff::new(Duration::from_millis(100), Duration::from_millis(350), 0.0);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(350));
    }

    #[test]
    fn test_bounds() {
        let backoff = RestartBackoff::default();
        let (low, high) = backoff.bounds(2);
        assert!(within(low, 1600, 1600));
        assert!(within(high, 2400, 2400));
    }
}
