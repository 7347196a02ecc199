//! Retry policy: attempt budget and backoff delays.

use std::time::Duration;

use rand::Rng;

use super::errors::PolicyError;

/// Retry policy for failed deliveries.
///
/// The budget is always finite: `validate` refuses `max_attempts == 0`, and
/// there is no "retry forever" setting.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total delivery attempts allowed per task (first try included).
    pub max_attempts: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Randomize each delay within its step of the schedule.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    /// 5 attempts, 2s base, x2 growth, capped at 60s, no jitter.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(self.multiplier));
        }
        if self.base_delay > self.max_delay {
            return Err(PolicyError::BaseExceedsMax {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }

    /// Calculate delay for the next retry based on attempt number.
    ///
    /// `attempts` is the number of attempts already made (1-indexed).
    /// delay = base_delay * multiplier^(attempts - 1), capped at `max_delay`.
    ///
    /// With base_delay=2s, multiplier=2.0, max_delay=60s:
    /// 2s, 4s, 8s, 16s, 32s, 60s, 60s, ...
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Delay actually applied after `attempts` attempts, jitter included.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if self.jitter {
            self.jittered_delay(attempts, &mut rand::thread_rng())
        } else {
            self.next_delay(attempts)
        }
    }

    /// Pick a delay uniformly between the previous step and this one.
    ///
    /// Each draw lies in `[next_delay(n-1), next_delay(n)]`, so the sequence
    /// stays non-decreasing even with jitter on. The first step draws from
    /// `[base/2, base]`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempts: u32, rng: &mut R) -> Duration {
        let high = self.next_delay(attempts);
        let low = if attempts <= 1 {
            high / 2
        } else {
            self.next_delay(attempts - 1)
        };
        if low >= high {
            return high;
        }
        Duration::from_secs_f64(rng.gen_range(low.as_secs_f64()..=high.as_secs_f64()))
    }

    /// Sum of every backoff a task can wait through before giving up.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.next_delay(n)).sum()
    }
}
