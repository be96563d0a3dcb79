//! Three-state circuit breaker guarding calls to an unstable dependency.
//!
//! The breaker starts `CLOSED`. Consecutive failures are counted and once
//! `failure_threshold` is reached it trips to `OPEN`, rejecting every caller
//! without touching the dependency. After `open_duration` the next caller
//! moves it to `HALF_OPEN` and becomes the single trial call: success closes
//! the breaker, failure re-opens it with a fresh `opened_at`. Other callers
//! are rejected while the trial is in flight.
//!
//! All transitions happen under one mutex so concurrent callers can never
//! both win the half-open trial.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Source of monotonic and wall-clock time.
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] to move
/// through open windows without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis =
            self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same elapsed counter.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the clock by `duration`
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Invalid resilience configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Circuit breaker is {state}, rejecting calls")]
pub struct CircuitOpenError {
    /// State that caused the rejection (`OPEN` or `HALF_OPEN`)
    pub state: CircuitState,
    /// Time left in the open window, when known
    pub retry_after: Option<Duration>,
}

/// Errors produced by [`CircuitBreaker::execute`]
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker rejected the call without running it
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The underlying operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

/// Result type for breaker-wrapped operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// State and Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected
    Open,
    /// One trial call probes recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, open_duration: Duration::from_secs(30) }
    }
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.open_duration.is_zero() {
            return Err(ConfigError::Invalid {
                message: "open_duration must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    /// Use a custom clock and build the breaker directly
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock }
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder carrying a custom clock
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        CircuitBreaker::with_clock(self.config, self.clock)
    }
}

/// Point-in-time view of the breaker for health reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub times_opened: u64,
    pub opened_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    total_calls: u64,
    rejected_calls: u64,
    times_opened: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            total_calls: 0,
            rejected_calls: 0,
            times_opened: 0,
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
        self.times_opened += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Circuit breaker with an injectable clock.
///
/// Clones share state, so one breaker can be handed to several tasks.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker on the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, inner: Arc::new(Mutex::new(BreakerState::new())), clock: Arc::new(clock) })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask the breaker for permission to make one call.
    ///
    /// The returned permit must be resolved with
    /// [`CircuitPermit::record_success`] or
    /// [`CircuitPermit::record_failure`]. Dropping a half-open trial permit
    /// without an outcome counts as a failure.
    pub fn try_acquire(&self) -> Result<CircuitPermit<C>, CircuitOpenError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_calls += 1;

        match inner.state {
            CircuitState::Closed => Ok(self.permit(false)),
            CircuitState::Open => {
                let elapsed =
                    inner.opened_at.map_or(self.config.open_duration, |at| now.duration_since(at));
                if elapsed >= self.config.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    debug!("Circuit breaker half-open, admitting trial call");
                    Ok(self.permit(true))
                } else {
                    inner.rejected_calls += 1;
                    Err(CircuitOpenError {
                        state: CircuitState::Open,
                        retry_after: Some(self.config.open_duration - elapsed),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    inner.rejected_calls += 1;
                    Err(CircuitOpenError { state: CircuitState::HalfOpen, retry_after: None })
                } else {
                    inner.trial_in_flight = true;
                    Ok(self.permit(true))
                }
            }
        }
    }

    /// Whether a call would currently be admitted, without claiming a slot
    pub fn can_execute(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.trial_in_flight,
            CircuitState::Open => inner.opened_at.map_or(true, |at| {
                self.clock.now().duration_since(at) >= self.config.open_duration
            }),
        }
    }

    /// Run `operation` behind the breaker and report its outcome
    #[instrument(skip(self, operation), fields(state = %self.get_state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let permit = self.try_acquire()?;
        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(source) => {
                permit.record_failure();
                Err(ResilienceError::OperationFailed { source })
            }
        }
    }

    pub fn get_state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            times_opened: inner.times_opened,
            opened_at: inner.opened_at,
        }
    }

    /// Force the breaker back to `CLOSED`
    pub fn reset(&self) {
        self.inner.lock().close();
        info!("Circuit breaker manually reset");
    }

    fn permit(&self, trial: bool) -> CircuitPermit<C> {
        CircuitPermit { breaker: self.clone(), trial, resolved: false }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                inner.close();
                info!("Circuit breaker closed after successful trial call");
            }
            // Late result from a call admitted before the breaker tripped.
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.trip(now);
                    warn!(
                        failures = inner.consecutive_failures,
                        open_ms = self.config.open_duration.as_millis() as u64,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen if trial => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.trip(now);
                warn!("Circuit breaker re-opened after failed trial call");
            }
            _ => {}
        }
    }
}

/// Admission ticket returned by [`CircuitBreaker::try_acquire`].
#[must_use = "a permit must be resolved with record_success or record_failure"]
pub struct CircuitPermit<C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
    trial: bool,
    resolved: bool,
}

impl<C: Clock> CircuitPermit<C> {
    /// Whether this permit is the half-open trial call
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial);
    }

    pub fn record_failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.trial);
    }

    /// Give the permit back without counting an outcome.
    ///
    /// Only meaningful for closed-state permits; an abandoned trial still
    /// counts as a failure.
    pub fn abandon(mut self) {
        self.resolved = true;
        if self.trial {
            self.breaker.on_failure(true);
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitPermit<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitPermit").field("trial", &self.trial).finish()
    }
}

impl<C: Clock> Drop for CircuitPermit<C> {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            self.breaker.on_failure(true);
        }
    }
}
