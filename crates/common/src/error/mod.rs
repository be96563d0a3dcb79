//! Shared error vocabulary for TixLens crates
//!
//! Every error type in the workspace answers the same questions: can the
//! failed operation be attempted again, how loud should it be in logs, and
//! does it need an operator. This module provides:
//!
//! 1. **`CommonError`**: error patterns that show up in several crates
//!    (configuration, timeouts, backend failures, rejected input).
//! 2. **`ErrorClassification`**: the trait every module error implements so
//!    retry and logging code can reason about errors generically.
//! 3. **`ErrorSeverity`**: the severity scale used in structured logs.
//!
//! ## Composition
//!
//! Module errors embed `CommonError` instead of duplicating its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum PoolError {
//!     #[error("pool exhausted after {0:?}")]
//!     Exhausted(Duration),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_classification!(PoolError, Common,
//!     Self::Exhausted(_) => {
//!         retryable: true,
//!         severity: ErrorSeverity::Warning,
//!         critical: false,
//!     }
//! );
//! ```
//!
//! | Level | Use Case |
//! |-------|----------|
//! | **Info** | Expected conditions (cancelled, deadline passed) |
//! | **Warning** | Degraded but operational (timeouts, open circuit) |
//! | **Error** | Failure requiring attention (bad config, rejected input) |
//! | **Critical** | Invariant violations |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error variants shared across crates
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error{}: {message}", field_suffix(.field))]
    Config { message: String, field: Option<String> },

    /// Operation deadline elapsed
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Failures reported by an external service
    #[error("Backend error from '{service}': {message}")]
    Backend { service: String, message: String, is_retryable: bool },

    /// Input rejected before any work was done
    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },
}

fn field_suffix(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Backend { .. } | Self::Validation { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn backend<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }
}

/// Standard classification interface for error types.
///
/// Retry executors consult `is_retryable`; logging picks levels from
/// `severity`.
pub trait ErrorClassification {
    /// Transient failures that may succeed if attempted again.
    fn is_retryable(&self) -> bool;

    /// Severity used for log level selection.
    fn severity(&self) -> ErrorSeverity;

    /// Whether an operator must look at this.
    fn is_critical(&self) -> bool;

    /// Suggested delay before the next attempt, when the source knows one.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Should be monitored but not critical
    Warning,
    /// Requires attention and action
    Error,
    /// Immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Implements `ErrorClassification` for a module error, delegating the
/// embedded `CommonError` variant and classifying the rest inline.
///
/// ```rust,ignore
/// impl_error_classification!(MyError, Common,
///     Self::Specific(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => e.retry_after(),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    //! Unit tests for the shared error vocabulary.

    use super::*;

    /// Validates `CommonError::config_field` display output.
    ///
    /// Assertions:
    /// - Confirms the field name is included in the message.
    /// - Ensures configuration errors are not retryable.
    #[test]
    fn test_config_field_display() {
        let err = CommonError::config_field("pool.size", "must be positive");
        assert_eq!(err.to_string(), "Configuration error in field 'pool.size': must be positive");
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Error);

        let plain = CommonError::config("missing file");
        assert_eq!(plain.to_string(), "Configuration error: missing file");
    }

    /// Validates retryability of timeouts and backend errors.
    ///
    /// Assertions:
    /// - Timeouts are retryable with Warning severity.
    /// - Backend errors follow their `is_retryable` flag.
    #[test]
    fn test_retryability_classification() {
        let timeout = CommonError::timeout("search", Duration::from_millis(250));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.severity(), ErrorSeverity::Warning);

        assert!(CommonError::backend("tickets", "503", true).is_retryable());
        assert!(!CommonError::backend("tickets", "400", false).is_retryable());
        assert!(!CommonError::validation("id", "empty").is_retryable());
    }

    /// Validates no shared error asks for an operator.
    #[test]
    fn test_common_errors_are_not_critical() {
        assert!(!CommonError::config("missing file").is_critical());
        assert!(!CommonError::backend("tickets", "503", true).is_critical());
    }

    #[derive(Debug, Error)]
    enum SampleError {
        #[error("flaky")]
        Flaky,
        #[error("broken")]
        Broken,
        #[error(transparent)]
        Common(#[from] CommonError),
    }

    impl_error_classification!(SampleError, Common,
        Self::Flaky => {
            retryable: true,
            severity: ErrorSeverity::Warning,
            critical: false,
            retry_after: Some(Duration::from_millis(10)),
        },
        Self::Broken => {
            retryable: false,
            severity: ErrorSeverity::Critical,
            critical: true,
        }
    );

    /// Validates the classification macro for inline and delegated variants.
    ///
    /// Assertions:
    /// - Inline variants use the declared classification.
    /// - The embedded CommonError delegates to its own classification.
    /// - Variants without `retry_after` fall back to `None`.
    #[test]
    fn test_classification_macro() {
        assert!(SampleError::Flaky.is_retryable());
        assert_eq!(SampleError::Flaky.retry_after(), Some(Duration::from_millis(10)));
        assert!(SampleError::Broken.is_critical());
        assert_eq!(SampleError::Broken.retry_after(), None);

        let common: SampleError = CommonError::validation("id", "empty").into();
        assert!(!common.is_retryable());
        assert_eq!(common.severity(), ErrorSeverity::Error);
        assert_eq!(common.retry_after(), None);
    }
}
