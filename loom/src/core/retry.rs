//! Classification-based retry with exponential backoff.
//!
//! The assistant reports failures as free text, so errors are classified by
//! substring. Permanent failures return immediately; everything else,
//! including unrecognized messages, is retried until the attempt budget runs
//! out. Errors are never wrapped: the caller sees the last underlying error.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Terms marking a failure that will not go away on its own. Checked first.
const NON_RETRYABLE: &[&str] = &[
    "invalid api key",
    "unauthorized",
    "bad request",
    "404",
    "not found",
    "forbidden",
    "401",
    "403",
];

/// Terms marking a transient failure.
const RETRYABLE: &[&str] = &[
    "rate limit",
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "temporary failure",
    "503",
    "502",
    "500",
    "overloaded",
    "service unavailable",
    "gateway timeout",
];

/// Retry budget for one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first (at least 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// `min(base_delay * 2^(attempt-1), max_delay)` for a 1-indexed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// Classify an error message. Unknown messages are treated as retryable.
pub fn classify(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if NON_RETRYABLE.iter().any(|term| lower.contains(term)) {
        return ErrorClass::NonRetryable;
    }
    if !RETRYABLE.iter().any(|term| lower.contains(term)) {
        debug!("unrecognized error text, assuming transient");
    }
    ErrorClass::Retryable
}

/// Blocking delay between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Result of [`retry_with`] together with attempt bookkeeping.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Number of times the operation ran.
    pub attempts: u32,
    /// Classification of the final error, if the operation failed.
    pub last_class: Option<ErrorClass>,
}

impl<T, E> RetryOutcome<T, E> {
    /// True when the operation failed with retryable errors on every attempt.
    pub fn exhausted(&self) -> bool {
        self.last_class == Some(ErrorClass::Retryable)
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// Errors are classified from their `{:#}` text with [`classify`].
pub fn retry_with<T, E, S, F>(config: &RetryConfig, sleeper: &S, op: F) -> RetryOutcome<T, E>
where
    E: Display,
    S: Sleeper + ?Sized,
    F: FnMut() -> Result<T, E>,
{
    retry_classified(config, sleeper, |err: &E| classify(&format!("{err:#}")), op)
}

/// [`retry_with`] with a caller-supplied classifier, for errors whose text
/// alone does not tell transient from permanent.
pub fn retry_classified<T, E, S, C, F>(
    config: &RetryConfig,
    sleeper: &S,
    classifier: C,
    mut op: F,
) -> RetryOutcome<T, E>
where
    E: Display,
    S: Sleeper + ?Sized,
    C: Fn(&E) -> ErrorClass,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    last_class: None,
                };
            }
            Err(err) => err,
        };

        let message = format!("{err:#}");
        let class = classifier(&err);
        if class == ErrorClass::NonRetryable {
            warn!(attempt, err = %message, "non-retryable failure");
            return RetryOutcome {
                result: Err(err),
                attempts: attempt,
                last_class: Some(class),
            };
        }
        if attempt >= max_attempts {
            warn!(attempt, err = %message, "retries exhausted");
            return RetryOutcome {
                result: Err(err),
                attempts: attempt,
                last_class: Some(class),
            };
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            err = %message,
            "attempt failed, retrying"
        );
        sleeper.sleep(delay);
    }
}

/// [`retry_with`] reduced to its result.
pub fn with_retry<T, E, S, F>(config: &RetryConfig, sleeper: &S, op: F) -> Result<T, E>
where
    E: Display,
    S: Sleeper + ?Sized,
    F: FnMut() -> Result<T, E>,
{
    retry_with(config, sleeper, op).result
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::test_support::RecordingSleeper;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Two timeouts then success: three calls, two sleeps, second sleep doubled.
    #[test]
    fn timeout_twice_then_success() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let outcome = retry_with(&config(5), &sleeper, || -> Result<&str> {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(anyhow!("request timeout after 30s"))
            } else {
                Ok("done")
            }
        });

        assert_eq!(outcome.result.expect("success"), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(outcome.attempts, 3);
        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.len(), 2);
        assert_eq!(sleeps[1], sleeps[0] * 2);
    }

    /// A permanent failure is returned after one call whatever the budget.
    #[test]
    fn unauthorized_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let result = with_retry(&config(10), &sleeper, || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(anyhow!("401 Unauthorized: check credentials"))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn exhausted_returns_last_error_without_trailing_sleep() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let outcome = retry_with(&config(3), &sleeper, || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(anyhow!("service overloaded (call {})", calls.get()))
        });

        assert!(outcome.exhausted());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(sleeper.sleeps().len(), 2);
        let err = outcome.result.expect_err("error");
        assert_eq!(err.to_string(), "service overloaded (call 3)");
    }

    #[test]
    fn unknown_errors_default_to_retryable() {
        assert_eq!(classify("something odd happened"), ErrorClass::Retryable);
        assert_eq!(classify("HTTP 503 Service Unavailable"), ErrorClass::Retryable);
        assert_eq!(classify("Forbidden"), ErrorClass::NonRetryable);
    }

    /// Non-retryable terms win when both lists match.
    #[test]
    fn non_retryable_checked_first() {
        assert_eq!(
            classify("gateway timeout: model not found"),
            ErrorClass::NonRetryable
        );
    }

    #[test]
    fn delay_doubles_and_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(cfg.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(cfg.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(cfg.delay_for_attempt(40), Duration::from_secs(30));
    }

    /// A custom classifier overrides the text match.
    #[test]
    fn classifier_decides_over_message_text() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let outcome = retry_classified(
            &config(3),
            &sleeper,
            |_: &anyhow::Error| ErrorClass::Retryable,
            || -> Result<()> {
                calls.set(calls.get() + 1);
                Err(anyhow!("404 not found"))
            },
        );
        assert!(outcome.exhausted());
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let _ = with_retry(&config(0), &sleeper, || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(anyhow!("timeout"))
        });
        assert_eq!(calls.get(), 1);
    }
}
