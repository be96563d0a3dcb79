//! Session types shared by the auth session and credential helpers
//!
//! Nothing here carries credential material. A session is a validity flag
//! plus two timestamps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Expiry reported by a successful credential helper run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpiry {
    /// Absolute expiry, or `None` when the helper did not say
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionExpiry {
    #[must_use]
    pub fn at(expires_at: DateTime<Utc>) -> Self {
        Self { expires_at: Some(expires_at) }
    }

    #[must_use]
    pub fn unspecified() -> Self {
        Self { expires_at: None }
    }

    /// Expiry `seconds` from now
    #[must_use]
    pub fn in_seconds(seconds: i64) -> Self {
        Self::at(Utc::now() + chrono::Duration::seconds(seconds))
    }
}

/// Read-only view of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub valid: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Valid and not within `skew` of expiry at `now`
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
        self.valid && now + skew < self.expires_at
    }

    /// Seconds until expiry, negative once expired
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

/// Authentication failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The credential helper did not answer in time
    #[error("authentication timed out after {waited:?}")]
    Timeout { waited: Duration },

    /// The credential helper refused or reported failure
    #[error("authentication denied: {reason}")]
    Denied { reason: String },

    /// The credential helper could not be run at all
    #[error("credential helper unavailable: {reason}")]
    Unavailable { reason: String },

    /// The caller's deadline ran out before the helper answered
    #[error("caller deadline passed during authentication")]
    DeadlineExceeded,

    /// The caller cancelled while waiting
    #[error("authentication cancelled")]
    Cancelled,
}

impl AuthError {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied { reason: reason.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }
}

impl ErrorClassification for AuthError {
    // Authentication is never retried by the resilient client; callers
    // decide whether to prompt and try again.
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Denied { .. } | Self::Unavailable { .. } => ErrorSeverity::Error,
            Self::DeadlineExceeded | Self::Cancelled => ErrorSeverity::Info,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
