//! Reconnection policy: retry counting and exponential backoff

use crate::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS};
use std::time::Duration;

/// `delay(attempt) = min(base * 2^attempt, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before reconnect attempt number `attempt`. Saturates at `cap`.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            Duration::from_millis(DEFAULT_BACKOFF_CAP_MS),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub ceiling: u32,
}

impl RetryState {
    pub fn new(ceiling: u32) -> Self {
        Self { attempt: 0, ceiling }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.ceiling
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }
}

/// Outcome of a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule one reconnect after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Stop using push for the rest of the feed's life
    Exhausted,
}

/// Owns the retry counter. Scheduling the timer is left to the caller.
#[derive(Debug, Clone)]
pub struct ReconnectController {
    retry: RetryState,
    policy: BackoffPolicy,
    exhausted: bool,
}

impl ReconnectController {
    pub fn new(ceiling: u32, policy: BackoffPolicy) -> Self {
        Self {
            retry: RetryState::new(ceiling),
            policy,
            exhausted: false,
        }
    }

    pub fn on_connected(&mut self) {
        self.retry.reset();
    }

    pub fn on_disconnected(&mut self) -> ReconnectDecision {
        if self.exhausted || self.retry.is_exhausted() {
            self.exhausted = true;
            return ReconnectDecision::Exhausted;
        }

        self.retry.attempt += 1;
        ReconnectDecision::Retry {
            attempt: self.retry.attempt,
            delay: self.policy.delay(self.retry.attempt),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.retry.attempt
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Default for ReconnectController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONNECT_ATTEMPTS, BackoffPolicy::default())
    }
}
