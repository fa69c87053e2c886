use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::BackoffPolicy;
use crate::Result;
use crate::StreamError;

/// Exponential reconnect scheduler for one listen stream.
///
/// `attempts` counts stream opens since the last [`reset`]. The first open
/// after a reset happens immediately; the `n`-th retry after it waits
/// `min(base * multiplier^n, ceiling)`, spread by a uniform jitter of
/// `±jitter_factor / 2` of the delay.
///
/// Failures are counted separately against the policy's retry budget.
///
/// [`reset`]: ExponentialBackoff::reset
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    attempts: usize,
    failures: usize,
    /// Set after an overload signal; pins the delay to the ceiling until reset
    at_max: bool,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            failures: 0,
            at_max: false,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Delay before the next attempt, without jitter
    pub fn current_delay(&self) -> Duration {
        if self.at_max {
            return Duration::from_millis(self.policy.max_delay_ms);
        }
        if self.attempts == 0 {
            return Duration::ZERO;
        }

        // `attempts` opens so far means `attempts` retries made once this one starts
        let exponent = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        let delay = self.policy.base_delay_ms as f64 * self.policy.multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.policy.max_delay_ms as f64) as u64)
    }

    /// Delay before the next attempt, with jitter applied
    pub fn next_delay(&self) -> Duration {
        let delay = self.current_delay();
        if delay.is_zero() || self.policy.jitter_factor <= 0.0 {
            return delay;
        }

        let delay_ms = delay.as_millis() as f64;
        let spread = delay_ms * self.policy.jitter_factor / 2.0;
        let jitter = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    /// Counts one more consecutive failure.
    ///
    /// Fails with [`StreamError::RetriesExhausted`] once the policy's retry
    /// budget is spent. A budget of zero never runs out.
    pub fn record_failure(&mut self) -> Result<()> {
        self.failures += 1;
        if self.policy.max_retries > 0 && self.failures > self.policy.max_retries {
            return Err(StreamError::RetriesExhausted(self.policy.max_retries).into());
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.failures = 0;
        self.at_max = false;
    }

    pub fn reset_to_max(&mut self) {
        self.at_max = true;
    }

    /// Sleeps for [`next_delay`](Self::next_delay) and counts the attempt.
    pub async fn backoff_and_wait(&mut self) {
        let delay = self.next_delay();
        self.attempts += 1;
        if delay.is_zero() {
            return;
        }
        debug!(attempts = self.attempts, delay_ms = delay.as_millis() as u64, "backing off");
        sleep(delay).await;
    }
}
