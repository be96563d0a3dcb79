//! Modular common utilities shared across TixLens crates.
//!
//! Nothing in this crate knows about tickets. The resilience primitives,
//! PII patterns, and session tracker are generic over the operations and
//! helpers the caller plugs in.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and classification
//! - `runtime`: async infrastructure (resilience, privacy patterns, auth
//!   session)
//! - `observability`: optional tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;
#[cfg(feature = "runtime")]
pub mod privacy;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{AuthError, AuthSession, AuthSessionConfig, CredentialHelper, SessionSnapshot};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    retry_with_policy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitOpenError, CircuitPermit, CircuitState, Clock, ConnectionPool,
    HandleManager, MockClock, PoolConfig, PoolError, PoolMetrics, PooledHandle, ResilienceError,
    ResilienceResult, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult, SystemClock,
};
