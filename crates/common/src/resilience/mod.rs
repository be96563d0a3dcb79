//! Resilience primitives for talking to unreliable services
//!
//! - **Circuit breaker**: stops calling a dependency after a run of failures
//!   and probes it with a single trial call once the open window elapses.
//! - **Retry**: bounded attempts with capped exponential backoff, jitter,
//!   caller deadlines, and cancellation.
//! - **Connection pool**: bounds in-flight calls and reuses transport
//!   handles; handles return to the pool when their guard drops.
//!
//! The primitives are generic over error and handle types and know nothing
//! about tickets. `tixlens-core` composes them into the resilient client.

pub mod circuit_breaker;
pub mod pool;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitOpenError, CircuitPermit, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    ResilienceError, ResilienceResult, SystemClock,
};
pub use pool::{ConnectionPool, HandleManager, PoolConfig, PoolError, PoolMetrics, PooledHandle};
pub use retry::{
    policies, retry_with_policy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
