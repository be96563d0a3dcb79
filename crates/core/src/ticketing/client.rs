//! Resilient client for the remote ticket service
//!
//! Every call runs the same pipeline:
//!
//! ```text
//! auth ─▶ breaker gate ─▶ pool acquire ─▶ retry(remote call) ─▶ record ─▶ release
//! ```
//!
//! The session, breaker, and pool are shared by all callers of one client.
//! The pooled handle is a guard, so it goes back to the pool on every exit
//! path, including cancellation of the caller's future.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tixlens_common::auth::{AuthSession, SessionSnapshot};
use tixlens_common::error::ErrorClassification;
use tixlens_common::resilience::{
    policies::TransientOnly, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, Clock,
    ConfigError, ConnectionPool, HandleManager, PoolConfig, PoolError, PoolMetrics, RetryConfig,
    RetryExecutor, SystemClock,
};
use tixlens_domain::constants::{DEFAULT_MAX_RESULTS_CEILING, DEFAULT_REQUEST_TIMEOUT_MS};
use tixlens_domain::{ClientSettings, SearchCriteria, Ticket, TicketQuery, TixLensError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::errors::{ErrorLayer, ServiceError, ServiceErrorKind, ServiceResult};
use super::ports::TicketRemote;

/// Opens pool handles through the remote port
pub struct RemoteHandles<R: TicketRemote> {
    remote: Arc<R>,
}

#[async_trait]
impl<R: TicketRemote> HandleManager for RemoteHandles<R> {
    type Handle = R::Handle;
    type Error = ServiceError;

    async fn create(&self) -> Result<R::Handle, ServiceError> {
        self.remote.open_handle().await
    }

    fn is_reusable(&self, handle: &R::Handle) -> bool {
        self.remote.is_reusable(handle)
    }
}

/// One kind of remote request, run once per retry attempt
#[async_trait]
trait RemoteOperation<R: TicketRemote>: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn run(&self, remote: &R, handle: &R::Handle) -> ServiceResult<Self::Output>;
}

struct SearchOperation {
    query: TicketQuery,
}

#[async_trait]
impl<R: TicketRemote> RemoteOperation<R> for SearchOperation {
    type Output = Vec<Ticket>;

    fn name(&self) -> &'static str {
        "search_tickets"
    }

    async fn run(&self, remote: &R, handle: &R::Handle) -> ServiceResult<Vec<Ticket>> {
        remote.search(handle, &self.query).await
    }
}

struct GetOperation {
    id: String,
}

#[async_trait]
impl<R: TicketRemote> RemoteOperation<R> for GetOperation {
    type Output = Option<Ticket>;

    fn name(&self) -> &'static str {
        "get_ticket"
    }

    async fn run(&self, remote: &R, handle: &R::Handle) -> ServiceResult<Option<Ticket>> {
        remote.get(handle, &self.id).await
    }
}

/// Point-in-time view of the client's resilience state
#[derive(Debug, Clone)]
pub struct ClientHealth {
    pub breaker: CircuitBreakerMetrics,
    pub pool: PoolMetrics,
    /// `None` until the first successful authentication
    pub session: Option<SessionSnapshot>,
    pub authenticated: bool,
}

impl ClientHealth {
    pub fn status_message(&self) -> String {
        format!(
            "breaker {} ({} consecutive failures), {}, session {}",
            self.breaker.state,
            self.breaker.consecutive_failures,
            self.pool.status_message(),
            if self.authenticated { "valid" } else { "absent or expired" }
        )
    }
}

/// Auth-, breaker-, pool-, and retry-wrapped access to a [`TicketRemote`]
pub struct ResilientServiceClient<R: TicketRemote, C: Clock = SystemClock> {
    remote: Arc<R>,
    session: Arc<AuthSession>,
    breaker: CircuitBreaker<C>,
    pool: ConnectionPool<RemoteHandles<R>>,
    retry: RetryExecutor<TransientOnly>,
    request_timeout: Duration,
    max_results_ceiling: u32,
}

impl<R: TicketRemote, C: Clock> std::fmt::Debug for ResilientServiceClient<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientServiceClient")
            .field("breaker", &self.breaker)
            .field("pool", &self.pool)
            .field("request_timeout", &self.request_timeout)
            .field("max_results_ceiling", &self.max_results_ceiling)
            .finish_non_exhaustive()
    }
}

impl<R: TicketRemote> ResilientServiceClient<R> {
    pub fn builder(remote: Arc<R>, session: Arc<AuthSession>) -> ResilientServiceClientBuilder<R> {
        ResilientServiceClientBuilder {
            remote,
            session,
            breaker: BreakerSource::Config(CircuitBreakerConfig::default(), SystemClock),
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_results_ceiling: DEFAULT_MAX_RESULTS_CEILING,
        }
    }

    /// Build a client from validated settings
    ///
    /// # Errors
    /// `TixLensError::Config` when the settings are rejected.
    pub fn from_settings(
        remote: Arc<R>,
        session: Arc<AuthSession>,
        settings: &ClientSettings,
    ) -> Result<Self, TixLensError> {
        settings.validate()?;

        let breaker = CircuitBreakerConfig::builder()
            .failure_threshold(settings.circuit_breaker.failure_threshold)
            .open_duration(settings.circuit_breaker.open_duration())
            .build()
            .map_err(config_error)?;
        let retry = RetryConfig::builder()
            .max_attempts(settings.retry.max_attempts)
            .base_delay(settings.retry.base_delay())
            .max_delay(settings.retry.max_delay())
            .backoff_factor(settings.retry.backoff_factor)
            .jitter(settings.retry.jitter)
            .build()
            .map_err(config_error)?;

        Self::builder(remote, session)
            .breaker_config(breaker)
            .retry_config(retry)
            .pool_config(PoolConfig {
                size: settings.pool.size,
                acquire_timeout: settings.pool.acquire_timeout(),
            })
            .request_timeout(settings.remote.request_timeout())
            .max_results_ceiling(settings.search.max_results_ceiling)
            .build()
    }
}

impl<R: TicketRemote, C: Clock> ResilientServiceClient<R, C> {
    /// Search with no deadline
    pub async fn search_tickets(&self, criteria: &SearchCriteria) -> ServiceResult<Vec<Ticket>> {
        self.search_tickets_with_deadline(criteria, None, &CancellationToken::new()).await
    }

    /// Search, giving up at `deadline` or when `cancel` fires
    ///
    /// # Errors
    /// `Validation` for rejected criteria before any remote work; otherwise
    /// the error of the layer that aborted the call.
    pub async fn search_tickets_with_deadline(
        &self,
        criteria: &SearchCriteria,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<Ticket>> {
        let query = TicketQuery::from_criteria(criteria, self.max_results_ceiling)?;
        let tickets = self.call(&SearchOperation { query }, deadline, cancel).await?;
        info!(count = tickets.len(), "Ticket search completed");
        Ok(tickets)
    }

    /// Fetch one ticket with no deadline
    pub async fn get_ticket(&self, id: &str) -> ServiceResult<Option<Ticket>> {
        self.get_ticket_with_deadline(id, None, &CancellationToken::new()).await
    }

    /// Fetch one ticket, giving up at `deadline` or when `cancel` fires
    pub async fn get_ticket_with_deadline(
        &self,
        id: &str,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Option<Ticket>> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ServiceError::invalid_input("ticket id must not be empty"));
        }
        self.call(&GetOperation { id: id.to_string() }, deadline, cancel).await
    }

    pub fn health(&self) -> ClientHealth {
        ClientHealth {
            breaker: self.breaker.metrics(),
            pool: self.pool.metrics(),
            session: self.session.snapshot(),
            authenticated: self.session.is_authenticated(),
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    pub fn pool_size(&self) -> usize {
        self.pool.config().size
    }

    pub fn max_results_ceiling(&self) -> u32 {
        self.max_results_ceiling
    }

    #[instrument(
        skip_all,
        fields(operation = <O as RemoteOperation<R>>::name(operation), call_id = %Uuid::new_v4())
    )]
    async fn call<O>(
        &self,
        operation: &O,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> ServiceResult<O::Output>
    where
        O: RemoteOperation<R>,
    {
        // Checked before any work, alongside argument validation.
        if cancel.is_cancelled() {
            return Err(ServiceError::cancelled(ErrorLayer::Validation));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ServiceError::deadline_exceeded(ErrorLayer::Validation));
        }

        self.session.ensure_authenticated_until(deadline, cancel).await.map_err(|err| {
            warn!(error = %err, "Authentication failed");
            ServiceError::from(err)
        })?;

        let permit = self.breaker.try_acquire().map_err(|err| {
            debug!(state = %err.state, "Circuit breaker rejected call");
            ServiceError::from(err)
        })?;

        let pool_timeout = self.pool.config().acquire_timeout;
        let (acquire_timeout, bounded_by_deadline) = match remaining(deadline) {
            Some(left) if left < pool_timeout => (left, true),
            _ => (pool_timeout, false),
        };
        let handle = match self.pool.acquire(acquire_timeout, cancel).await {
            Ok(handle) => handle,
            Err(err) => {
                let err = match err {
                    PoolError::Exhausted { .. } | PoolError::CreateTimeout { .. }
                        if bounded_by_deadline =>
                    {
                        ServiceError::deadline_exceeded(ErrorLayer::Pool)
                    }
                    other => ServiceError::from(other),
                };
                if err.kind().counts_against_breaker() {
                    permit.record_failure();
                } else {
                    permit.abandon();
                }
                warn!(kind = %err.kind(), "Could not check out a connection");
                return Err(err);
            }
        };

        let remote = &*self.remote;
        let handle_ref: &R::Handle = &handle;
        let request_timeout = self.request_timeout;
        let outcome = self
            .retry
            .execute_until(deadline, cancel, |attempt| async move {
                debug!(attempt, "Calling ticket service");
                match tokio::time::timeout(request_timeout, operation.run(remote, handle_ref)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::timeout(format!(
                        "no answer within {}ms",
                        request_timeout.as_millis()
                    ))),
                }
            })
            .await;

        match outcome {
            Ok(output) => {
                permit.record_success();
                Ok(output)
            }
            Err(retry_error) => {
                let err = ServiceError::from_retry(retry_error);
                match err.kind() {
                    kind if kind.counts_against_breaker() => {
                        permit.record_failure();
                        handle.discard();
                    }
                    ServiceErrorKind::DeadlineExceeded | ServiceErrorKind::Cancelled => {
                        permit.abandon();
                    }
                    // The remote answered; it is reachable even if it said no.
                    _ => permit.record_success(),
                }
                if err.is_remote_auth_rejection() {
                    self.session.invalidate();
                }
                warn!(
                    kind = %err.kind(),
                    layer = %err.layer(),
                    attempts = err.attempts(),
                    retryable = err.is_retryable(),
                    "Ticket service call failed"
                );
                Err(err)
            }
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn config_error(err: ConfigError) -> TixLensError {
    TixLensError::Config(err.to_string())
}

enum BreakerSource<C: Clock> {
    Config(CircuitBreakerConfig, C),
    Shared(CircuitBreaker<C>),
}

/// Builder for [`ResilientServiceClient`].
pub struct ResilientServiceClientBuilder<R: TicketRemote, C: Clock = SystemClock> {
    remote: Arc<R>,
    session: Arc<AuthSession>,
    breaker: BreakerSource<C>,
    retry: RetryConfig,
    pool: PoolConfig,
    request_timeout: Duration,
    max_results_ceiling: u32,
}

impl<R: TicketRemote, C: Clock> ResilientServiceClientBuilder<R, C> {
    /// Use a breaker owned by the caller (for example to share it or to
    /// drive it with a mock clock)
    pub fn breaker<C2: Clock>(self, breaker: CircuitBreaker<C2>) -> ResilientServiceClientBuilder<R, C2> {
        ResilientServiceClientBuilder {
            remote: self.remote,
            session: self.session,
            breaker: BreakerSource::Shared(breaker),
            retry: self.retry,
            pool: self.pool,
            request_timeout: self.request_timeout,
            max_results_ceiling: self.max_results_ceiling,
        }
    }

    /// Build a fresh breaker from `config` on the builder's clock
    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = match self.breaker {
            BreakerSource::Config(_, clock) => BreakerSource::Config(config, clock),
            BreakerSource::Shared(existing) => BreakerSource::Shared(existing),
        };
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = config;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_results_ceiling(mut self, ceiling: u32) -> Self {
        self.max_results_ceiling = ceiling;
        self
    }

    /// # Errors
    /// `TixLensError::Config` for an invalid breaker or pool configuration
    /// or a zero result ceiling.
    pub fn build(self) -> Result<ResilientServiceClient<R, C>, TixLensError> {
        if self.max_results_ceiling == 0 {
            return Err(TixLensError::Config(
                "max_results_ceiling must be greater than zero".to_string(),
            ));
        }

        let breaker = match self.breaker {
            BreakerSource::Config(config, clock) => {
                CircuitBreaker::with_clock(config, clock).map_err(config_error)?
            }
            BreakerSource::Shared(breaker) => breaker,
        };
        let pool = ConnectionPool::new(self.pool, RemoteHandles { remote: Arc::clone(&self.remote) })
            .map_err(config_error)?;

        Ok(ResilientServiceClient {
            remote: self.remote,
            session: self.session,
            breaker,
            pool,
            retry: RetryExecutor::new(self.retry, TransientOnly),
            request_timeout: self.request_timeout,
            max_results_ceiling: self.max_results_ceiling,
        })
    }
}
