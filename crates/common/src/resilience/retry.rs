//! Bounded retry with capped exponential backoff
//!
//! A [`RetryExecutor`] runs an async operation up to `max_attempts` times.
//! Between attempts it sleeps `min(base_delay * backoff_factor^(n-1),
//! max_delay)` where `n` is the attempt that just failed, optionally spread
//! by ±20% jitter. A [`RetryPolicy`] decides which errors are worth another
//! attempt; everything else is surfaced immediately as
//! [`RetryError::NonRetryable`].
//!
//! Every run can carry a deadline and a [`CancellationToken`]. The executor
//! never starts an attempt, or a backoff sleep, that would end past the
//! deadline.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::ErrorClassification;

/// Fraction of the computed delay that jitter may add or remove.
pub const JITTER_RATIO: f64 = 0.2;

/// Errors that end a retry run
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The policy refused to retry this error
    #[error("operation failed with non-retryable error")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The caller's deadline left no room for another attempt
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded {
        attempts: u32,
        #[source]
        last: Option<E>,
    },

    /// The caller cancelled the run
    #[error("retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of attempts that were started before the run ended
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// The last error returned by the operation, if any attempt ran
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::NonRetryable { source, .. } => Some(source),
            Self::DeadlineExceeded { last, .. } => last,
            Self::Cancelled { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decides whether a failed attempt should be retried
pub trait RetryPolicy<E> {
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff
    Retry,
    /// Retry no sooner than this delay; the configured backoff is the floor
    /// and `max_delay` the cap
    RetryAfter(Duration),
    /// Surface the error now
    Stop,
}

/// Immutable retry settings. Construct through [`RetryConfig::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                message: format!("backoff_factor must be >= 1.0, got {}", self.backoff_factor),
            });
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::Invalid {
                message: "base_delay must not exceed max_delay".to_string(),
            });
        }
        Ok(())
    }

    /// Backoff before the attempt following failed attempt `attempt`
    /// (1-based), without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }

    /// Apply ±20% jitter when enabled. Never exceeds `max_delay`.
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - JITTER_RATIO)..=(1.0 + JITTER_RATIO));
        Duration::from_secs_f64(delay.as_secs_f64() * factor).min(self.max_delay)
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = enabled;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs operations under a [`RetryConfig`] and a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retry without deadline or cancellation
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_until(None, &CancellationToken::new(), operation).await
    }

    /// Retry until success, a non-retryable error, exhaustion, the deadline,
    /// or cancellation, whichever comes first.
    ///
    /// `operation` receives the 1-based attempt number.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_until<F, Fut, T, E>(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut last_error: Option<E> = None;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(RetryError::DeadlineExceeded { attempts: attempt, last: last_error });
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.config.max_attempts, "Executing attempt");

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                outcome = bounded(deadline, operation(attempt)) => outcome,
            };

            let error = match outcome {
                Some(Ok(value)) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Some(Err(error)) => error,
                None => {
                    warn!(attempt, "Deadline reached while attempt was in flight");
                    return Err(RetryError::DeadlineExceeded { attempts: attempt, last: last_error });
                }
            };

            let backoff = || self.config.apply_jitter(self.config.delay_for_attempt(attempt));
            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt, error = %error, "Error is not retryable");
                    return Err(RetryError::NonRetryable { attempts: attempt, source: error });
                }
                RetryDecision::Retry => backoff(),
                RetryDecision::RetryAfter(hint) => hint.max(backoff()).min(self.config.max_delay),
            };

            if attempt >= self.config.max_attempts {
                warn!(attempts = attempt, error = %error, "All retry attempts exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: error });
            }

            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "Backoff would pass deadline");
                    return Err(RetryError::DeadlineExceeded { attempts: attempt, last: Some(error) });
                }
            }

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn bounded<Fut: Future>(deadline: Option<Instant>, fut: Fut) -> Option<Fut::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Build an executor and run `operation` once through it
pub async fn retry_with_policy<F, Fut, T, E, P>(
    config: RetryConfig,
    policy: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    RetryExecutor::new(config, policy).execute(operation).await
}

/// Pre-defined retry policies
pub mod policies {
    use super::{ErrorClassification, RetryDecision, RetryPolicy};

    /// Retries every error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries while the predicate returns true
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    /// Retries errors that classify themselves as retryable, honoring any
    /// `retry_after` hint they carry.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TransientOnly;

    impl<E: ErrorClassification> RetryPolicy<E> for TransientOnly {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            error.retry_after().map_or(RetryDecision::Retry, RetryDecision::RetryAfter)
        }
    }
}
