//! Ticket service error types and classification
//!
//! Every failure of a resilient call is reduced to a [`ServiceError`]: a
//! [`ServiceErrorKind`] that drives retry and breaker decisions, the
//! [`ErrorLayer`] that aborted the call, and a message safe to log.

use std::fmt;
use std::time::Duration;

use tixlens_common::auth::AuthError;
use tixlens_common::error::{ErrorClassification, ErrorSeverity};
use tixlens_common::resilience::{CircuitOpenError, PoolError, RetryError};
use tixlens_domain::{CriteriaError, TixLensError};

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The credential helper did not answer in time
    AuthTimeout,
    /// The helper or the remote service refused the credential
    AuthDenied,
    /// The breaker rejected the call without contacting the remote
    CircuitOpen,
    /// The remote could not be reached or reported a transient failure
    Connection,
    /// The remote did not answer in time
    Timeout,
    /// The remote refused the request itself
    RemoteRejected,
    /// No pooled handle became free in time
    PoolExhausted,
    /// Invalid criteria or an undecodable response
    Validation,
    /// The caller's deadline passed
    DeadlineExceeded,
    /// The caller cancelled
    Cancelled,
}

impl ServiceErrorKind {
    /// Transient kinds worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }

    /// Kinds that say something about the remote's health and therefore
    /// count against the circuit breaker
    pub fn counts_against_breaker(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthTimeout => write!(f, "Auth Timeout"),
            Self::AuthDenied => write!(f, "Auth Denied"),
            Self::CircuitOpen => write!(f, "Circuit Open"),
            Self::Connection => write!(f, "Connection Failed"),
            Self::Timeout => write!(f, "Timeout"),
            Self::RemoteRejected => write!(f, "Remote Rejected"),
            Self::PoolExhausted => write!(f, "Pool Exhausted"),
            Self::Validation => write!(f, "Validation Error"),
            Self::DeadlineExceeded => write!(f, "Deadline Exceeded"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Layer of the call pipeline that aborted the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorLayer {
    Auth,
    Circuit,
    Pool,
    Remote,
    Validation,
}

impl fmt::Display for ErrorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "auth"),
            Self::Circuit => write!(f, "circuit"),
            Self::Pool => write!(f, "pool"),
            Self::Remote => write!(f, "remote"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Error returned by the resilient client and its remote port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    kind: ServiceErrorKind,
    layer: ErrorLayer,
    message: String,
    status: Option<u16>,
    retry_after: Option<Duration>,
    attempts: u32,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, layer: ErrorLayer, message: impl Into<String>) -> Self {
        Self { kind, layer, message: message.into(), status: None, retry_after: None, attempts: 0 }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Connection, ErrorLayer::Remote, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, ErrorLayer::Remote, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::RemoteRejected, ErrorLayer::Remote, message).with_status(status)
    }

    /// The remote refused the caller's credential
    pub fn remote_auth_denied(status: u16) -> Self {
        Self::new(
            ServiceErrorKind::AuthDenied,
            ErrorLayer::Remote,
            format!("ticket service refused the credential (HTTP {status})"),
        )
        .with_status(status)
    }

    /// The remote answered with something that is not a ticket payload
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Validation, ErrorLayer::Remote, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Validation, ErrorLayer::Validation, message)
    }

    pub fn cancelled(layer: ErrorLayer) -> Self {
        Self::new(ServiceErrorKind::Cancelled, layer, "call cancelled by caller")
    }

    pub fn deadline_exceeded(layer: ErrorLayer) -> Self {
        Self::new(ServiceErrorKind::DeadlineExceeded, layer, "caller deadline exceeded")
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn kind(&self) -> ServiceErrorKind {
        self.kind
    }

    pub fn layer(&self) -> ErrorLayer {
        self.layer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the remote answered with one
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Remote attempts made before the call was abandoned
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The remote itself refused the credential, so the session is stale
    pub fn is_remote_auth_rejection(&self) -> bool {
        self.kind == ServiceErrorKind::AuthDenied && self.layer == ErrorLayer::Remote
    }

    /// Collapse a retry outcome into the error the caller sees
    pub fn from_retry(error: RetryError<ServiceError>) -> Self {
        let attempts = error.attempts();
        match error {
            RetryError::Exhausted { last, .. } | RetryError::NonRetryable { source: last, .. } => {
                last.with_attempts(attempts)
            }
            RetryError::DeadlineExceeded { last, .. } => {
                let mut err = Self::deadline_exceeded(ErrorLayer::Remote).with_attempts(attempts);
                if let Some(last) = last {
                    err.message = format!("caller deadline exceeded; last error: {last}");
                }
                err
            }
            RetryError::Cancelled { .. } => {
                Self::cancelled(ErrorLayer::Remote).with_attempts(attempts)
            }
        }
    }

    /// Convert to domain error type
    pub fn into_domain_error(self) -> TixLensError {
        let message = self.to_string();
        match self.kind {
            ServiceErrorKind::AuthTimeout | ServiceErrorKind::AuthDenied => {
                TixLensError::Auth(message)
            }
            ServiceErrorKind::Validation => TixLensError::InvalidInput(message),
            ServiceErrorKind::CircuitOpen
            | ServiceErrorKind::Connection
            | ServiceErrorKind::Timeout
            | ServiceErrorKind::RemoteRejected
            | ServiceErrorKind::PoolExhausted
            | ServiceErrorKind::DeadlineExceeded
            | ServiceErrorKind::Cancelled => TixLensError::Network(message),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} layer): {}", self.kind, self.layer, self.message)?;
        if let Some(status) = self.status {
            write!(f, " [HTTP {status}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

impl ErrorClassification for ServiceError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ServiceErrorKind::Cancelled => ErrorSeverity::Info,
            ServiceErrorKind::CircuitOpen
            | ServiceErrorKind::Connection
            | ServiceErrorKind::Timeout
            | ServiceErrorKind::PoolExhausted
            | ServiceErrorKind::DeadlineExceeded
            | ServiceErrorKind::AuthTimeout => ErrorSeverity::Warning,
            ServiceErrorKind::AuthDenied
            | ServiceErrorKind::RemoteRejected
            | ServiceErrorKind::Validation => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Timeout { waited } => Self::new(
                ServiceErrorKind::AuthTimeout,
                ErrorLayer::Auth,
                format!("credential helper did not answer within {waited:?}"),
            ),
            AuthError::Denied { .. } | AuthError::Unavailable { .. } => {
                Self::new(ServiceErrorKind::AuthDenied, ErrorLayer::Auth, err.to_string())
            }
            AuthError::DeadlineExceeded => Self::deadline_exceeded(ErrorLayer::Auth),
            AuthError::Cancelled => Self::cancelled(ErrorLayer::Auth),
        }
    }
}

impl From<CircuitOpenError> for ServiceError {
    fn from(err: CircuitOpenError) -> Self {
        let mut converted = Self::new(ServiceErrorKind::CircuitOpen, ErrorLayer::Circuit, err.to_string());
        converted.retry_after = err.retry_after;
        converted
    }
}

impl From<PoolError<ServiceError>> for ServiceError {
    fn from(err: PoolError<ServiceError>) -> Self {
        match err {
            PoolError::Exhausted { size, waited } => Self::new(
                ServiceErrorKind::PoolExhausted,
                ErrorLayer::Pool,
                format!("all {size} handles busy for {waited:?}"),
            ),
            PoolError::CreateTimeout { waited } => Self::new(
                ServiceErrorKind::Timeout,
                ErrorLayer::Pool,
                format!("opening a connection took longer than {waited:?}"),
            ),
            PoolError::Cancelled => Self::cancelled(ErrorLayer::Pool),
            PoolError::Closed => {
                Self::new(ServiceErrorKind::Connection, ErrorLayer::Pool, "connection pool closed")
            }
            // Opening a handle talks to the remote; keep its classification.
            PoolError::Create { source } => source,
        }
    }
}

impl From<CriteriaError> for ServiceError {
    fn from(err: CriteriaError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

/// Convenience conversion to Result
impl From<ServiceError> for TixLensError {
    fn from(err: ServiceError) -> Self {
        err.into_domain_error()
    }
}

/// Result type for ticket service calls
pub type ServiceResult<T> = Result<T, ServiceError>;
