//! Reconnect backoff policy.

use std::time::Duration;

/// Capped exponential backoff over numbered reconnect attempts.
///
/// Attempts are counted from 1; the delay doubles per attempt and never
/// exceeds the cap. With the defaults (base 1000 ms, cap 16000 ms) the
/// sequence is 1000, 2000, 4000, 8000, 16000, 16000, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            cap: cap.max(base),
            max_attempts,
        }
    }

    /// Delay before the given attempt (numbered from 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .saturating_mul(1u32 << exponent)
            .min(self.cap)
    }

    /// Whether the given attempt counter has used up all retries.
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::DEFAULT_BASE_BACKOFF_MS),
            Duration::from_millis(crate::DEFAULT_BACKOFF_CAP_MS),
            crate::DEFAULT_MAX_RECONNECT_ATTEMPTS,
        )
    }
}
