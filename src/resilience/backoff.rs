//! Reconnect pacing for the upstream block-event subscription.

use rand::Rng;
use std::time::Duration;

/// Spacing between subscription attempts.
///
/// Attempts themselves are never capped. After `n` consecutive failures the
/// wait is `interval * 2^n`, clamped to `max_delay`, plus up to a tenth of
/// that again as jitter so that several relays restarted together do not
/// reconnect in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// `max_delay_ms` below `interval_ms` is raised to it.
    pub fn new(interval_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            max_delay: Duration::from_millis(max_delay_ms.max(interval_ms)),
        }
    }

    pub fn delay(&self, failures: u32) -> Duration {
        let ceiling = self.max_delay.max(self.interval);
        let doubled = 1u32
            .checked_shl(failures)
            .and_then(|factor| self.interval.checked_mul(factor))
            .unwrap_or(ceiling);
        with_jitter(doubled.min(ceiling))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(1_000, 30_000)
    }
}

/// `delay` plus a random extra in `[0, delay / 10)`.
fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
}
