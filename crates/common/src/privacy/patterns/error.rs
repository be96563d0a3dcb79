use thiserror::Error;

use crate::error::{CommonError, ErrorSeverity};
use crate::impl_error_classification;

/// Errors raised while building a pattern matcher.
///
/// Matching itself never fails; only configuration can be wrong.
#[derive(Debug, Error)]
pub enum PiiError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Pattern compilation error for '{kind}': {message}")]
    PatternCompilation { kind: String, message: String },

    /// A custom pattern would match a placeholder, which breaks idempotence
    #[error("Pattern for '{kind}' matches placeholder '{placeholder}'")]
    PlaceholderCollision { kind: String, placeholder: String },

    #[error("Duplicate pattern kind '{0}'")]
    DuplicateKind(String),
}

pub type PiiResult<T> = Result<T, PiiError>;

impl_error_classification!(PiiError, Common,
    Self::PatternCompilation { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::PlaceholderCollision { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::DuplicateKind(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

impl From<PiiError> for CommonError {
    fn from(err: PiiError) -> Self {
        match err {
            PiiError::Common(e) => e,
            other => CommonError::config_field("sanitizer", other.to_string()),
        }
    }
}
