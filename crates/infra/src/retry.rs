//! Bounded retry with exponential backoff and full jitter.
//!
//! Used by the ledger to re-run a read-decide-write cycle after losing a
//! compare-and-swap race. Each retry re-reads fresh state, so there is no
//! cached decision to invalidate.
//!
//! ```rust
//! use std::time::Duration;
//! use stockledger_infra::RetryPolicy;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .initial_backoff(Duration::from_millis(1))
//!     .max_backoff(Duration::from_millis(50))
//!     .build();
//! assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(1));
//! ```

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Retry policy for optimistic concurrency conflicts.
///
/// # Default Values
///
/// - `max_attempts`: 8
/// - `initial_backoff`: 2ms
/// - `max_backoff`: 100ms
/// - `multiplier`: 2.0
/// - `deadline`: none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Backoff ceiling after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap for the exponential backoff ceiling.
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Wall-clock budget across all attempts. A retry whose backoff would cross it is
    /// not started.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_MULTIPLIER,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: RetryPolicy::default(),
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Upper bound of the backoff after `failed_attempt` (1-based) failed.
    ///
    /// `initial_backoff * multiplier^(failed_attempt - 1)`, capped at `max_backoff`.
    #[must_use]
    pub fn backoff_ceiling(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos.max(0.0) as u64)
    }

    /// Full jitter: uniform in `[0, backoff_ceiling(failed_attempt)]`.
    pub fn jittered_backoff<R: Rng>(&self, failed_attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.backoff_ceiling(failed_attempt).as_nanos() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rng.gen_range(0..=ceiling))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.policy.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.policy.max_backoff = backoff;
        self
    }

    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.policy.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Outcome of a failed [`retry_with_backoff`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error.
    Fatal(E),
    /// Retryable failures continued until the attempt or time budget ran out.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy's budget is spent.
///
/// `operation` receives the 1-based attempt number. Between attempts the calling
/// thread sleeps for a jittered backoff.
pub fn retry_with_backoff<T, E>(
    policy: &RetryPolicy,
    mut operation: impl FnMut(u32) -> Result<T, E>,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, RetryError<E>> {
    let started = Instant::now();
    let mut rng = rand::thread_rng();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => return Err(RetryError::Fatal(err)),
            Err(err) => err,
        };

        if attempt >= policy.attempts() {
            return Err(RetryError::Exhausted { attempts: attempt, last: err });
        }

        let backoff = policy.jittered_backoff(attempt, &mut rng);
        if let Some(deadline) = policy.deadline {
            if started.elapsed() + backoff >= deadline {
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }
        }

        tracing::debug!(
            attempt,
            backoff_us = backoff.as_micros() as u64,
            "retryable failure, backing off"
        );
        thread::sleep(backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_backoff(Duration::from_micros(10))
            .max_backoff(Duration::from_micros(50))
            .build()
    }

    #[test]
    fn defaults_match_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.initial_backoff, Duration::from_millis(2));
        assert_eq!(policy.max_backoff, Duration::from_millis(100));
        assert_eq!(policy.deadline, None);
    }

    #[test]
    fn backoff_ceiling_grows_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(2));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(4));
        assert_eq!(policy.backoff_ceiling(4), Duration::from_millis(16));
        assert_eq!(policy.backoff_ceiling(7), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_ceiling() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..=10 {
            let backoff = policy.jittered_backoff(attempt, &mut rng);
            assert!(backoff <= policy.backoff_ceiling(attempt));
        }
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result = retry_with_backoff(
            &fast_policy(5),
            |attempt| {
                calls += 1;
                if attempt < 3 { Err("conflict") } else { Ok(attempt) }
            },
            |_| true,
        );
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            &fast_policy(5),
            |_| {
                calls += 1;
                Err("rejected")
            },
            |_| false,
        );
        assert_eq!(result, Err(RetryError::Fatal("rejected")));
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhaustion_reports_attempt_count() {
        let result: Result<(), _> = retry_with_backoff(&fast_policy(4), |_| Err("conflict"), |_| true);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: "conflict"
            })
        );
    }

    #[test]
    fn zero_deadline_stops_after_first_attempt() {
        let policy = RetryPolicy::builder().deadline(Duration::ZERO).build();
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            &policy,
            |_| {
                calls += 1;
                Err("conflict")
            },
            |_| true,
        );
        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _ = retry_with_backoff(
            &fast_policy(0),
            |_| {
                calls += 1;
                Err::<(), _>("conflict")
            },
            |_| true,
        );
        assert_eq!(calls, 1);
    }
}
