//! Authenticated session lifecycle
//!
//! One [`AuthSession`] per client holds the single authoritative session.
//! Reads take a snapshot; refreshes are serialized so a burst of callers
//! that all find the session expired triggers exactly one helper run.
//!
//! A session never becomes valid again once it has been invalidated or has
//! expired; only a successful helper run installs a new one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::traits::CredentialHelper;
use super::types::{AuthError, SessionExpiry, SessionSnapshot};

/// Session timing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSessionConfig {
    /// Longest wait for one helper run
    pub helper_timeout: Duration,
    /// Lifetime assumed when the helper reports no expiry
    pub default_ttl: Duration,
    /// Treat the session as expired this long before `expires_at`
    pub expiry_skew: Duration,
}

impl Default for AuthSessionConfig {
    fn default() -> Self {
        Self {
            helper_timeout: Duration::from_secs(30),
            default_ttl: Duration::from_secs(3600),
            expiry_skew: Duration::from_secs(30),
        }
    }
}

/// Owns the current session and the helper that renews it
pub struct AuthSession {
    helper: Arc<dyn CredentialHelper>,
    config: AuthSessionConfig,
    current: RwLock<Option<SessionSnapshot>>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("config", &self.config)
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    #[must_use]
    pub fn new(helper: Arc<dyn CredentialHelper>, config: AuthSessionConfig) -> Self {
        Self { helper, config, current: RwLock::new(None), refresh: Mutex::new(()) }
    }

    /// Resume a session established elsewhere (for example by a previous run
    /// that persisted only its timestamps).
    #[must_use]
    pub fn resume(
        helper: Arc<dyn CredentialHelper>,
        config: AuthSessionConfig,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let session = Self::new(helper, config);
        *session.current.write() = Some(SessionSnapshot { valid: true, issued_at, expires_at });
        session
    }

    pub fn config(&self) -> &AuthSessionConfig {
        &self.config
    }

    /// Current session, if one was ever established
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        *self.current.read()
    }

    /// Whether the current session can be used right now
    pub fn is_authenticated(&self) -> bool {
        self.usable_snapshot().is_some()
    }

    /// Mark the current session invalid; the next call re-authenticates
    pub fn invalidate(&self) {
        if let Some(session) = self.current.write().as_mut() {
            if session.valid {
                session.valid = false;
                info!("Auth session invalidated");
            }
        }
    }

    /// Make sure a valid session exists, running the helper if needed
    pub async fn ensure_authenticated(&self) -> Result<SessionSnapshot, AuthError> {
        self.ensure_authenticated_until(None, &CancellationToken::new()).await
    }

    /// Like [`ensure_authenticated`](Self::ensure_authenticated), bounded by
    /// the caller's deadline and cancellation token.
    ///
    /// The helper wait is the shorter of the configured helper timeout and
    /// the time left before `deadline`.
    #[instrument(skip_all)]
    pub async fn ensure_authenticated_until(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<SessionSnapshot, AuthError> {
        if let Some(session) = self.usable_snapshot() {
            return Ok(session);
        }

        let (budget, bounded_by_deadline) = self.helper_budget(deadline);
        let started = Instant::now();
        let until = started + budget;
        let out_of_time = |waited: Duration| {
            if bounded_by_deadline {
                AuthError::DeadlineExceeded
            } else {
                AuthError::Timeout { waited }
            }
        };

        let _guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthError::Cancelled),
            guard = tokio::time::timeout_at(until, self.refresh.lock()) => match guard {
                Ok(guard) => guard,
                Err(_) => return Err(out_of_time(started.elapsed())),
            },
        };

        // Another caller may have refreshed while this one waited.
        if let Some(session) = self.usable_snapshot() {
            debug!("Session refreshed by concurrent caller");
            return Ok(session);
        }

        self.invalidate();
        debug!(budget_ms = budget.as_millis() as u64, "Running credential helper");

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthError::Cancelled),
            outcome = tokio::time::timeout_at(until, self.helper.check_or_refresh()) => outcome,
        };

        let expiry = match outcome {
            Ok(Ok(expiry)) => expiry,
            Ok(Err(err)) => {
                warn!(error = %err, "Credential helper failed");
                return Err(err);
            }
            Err(_) => {
                let waited = started.elapsed();
                warn!(
                    waited_ms = waited.as_millis() as u64,
                    bounded_by_deadline,
                    "Credential helper did not answer in time"
                );
                return Err(out_of_time(waited));
            }
        };

        let session = self.install(expiry)?;
        info!(expires_at = %session.expires_at, "Auth session established");
        Ok(session)
    }

    fn install(&self, expiry: SessionExpiry) -> Result<SessionSnapshot, AuthError> {
        let issued_at = Utc::now();
        let expires_at = match expiry.expires_at {
            Some(at) => at,
            None => {
                issued_at
                    + chrono::Duration::from_std(self.config.default_ttl)
                        .unwrap_or_else(|_| chrono::Duration::hours(1))
            }
        };

        let session = SessionSnapshot { valid: true, issued_at, expires_at };
        if !session.is_usable_at(issued_at, self.config.expiry_skew) {
            return Err(AuthError::denied("credential helper reported an expired session"));
        }

        *self.current.write() = Some(session);
        Ok(session)
    }

    fn usable_snapshot(&self) -> Option<SessionSnapshot> {
        let session = (*self.current.read())?;
        session.is_usable_at(Utc::now(), self.config.expiry_skew).then_some(session)
    }

    /// Helper wait and whether the caller's deadline, not the helper
    /// timeout, is what limits it
    fn helper_budget(&self, deadline: Option<Instant>) -> (Duration, bool) {
        match deadline.map(|d| d.saturating_duration_since(Instant::now())) {
            Some(left) if left < self.config.helper_timeout => (left, true),
            _ => (self.config.helper_timeout, false),
        }
    }
}
