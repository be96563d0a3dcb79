//! Bounded pool of reusable transport handles
//!
//! A [`ConnectionPool`] caps the number of handles checked out at once to
//! `size`. Callers beyond that wait up to their acquire timeout and then fail
//! with [`PoolError::Exhausted`]. Handles are created lazily through a
//! [`HandleManager`] and returned to the idle list when the
//! [`PooledHandle`] guard drops, so release happens on every exit path
//! including early returns and task cancellation.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};

/// Creates and vets handles for a [`ConnectionPool`]
#[async_trait]
pub trait HandleManager: Send + Sync + 'static {
    type Handle: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a fresh handle
    async fn create(&self) -> Result<Self::Handle, Self::Error>;

    /// Whether a returned handle may be handed out again
    fn is_reusable(&self, _handle: &Self::Handle) -> bool {
        true
    }
}

/// Errors returned by [`ConnectionPool::acquire`]
#[derive(Debug, Error)]
pub enum PoolError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// No handle became free within the acquire timeout
    #[error("connection pool exhausted: {size} handles busy for {waited:?}")]
    Exhausted { size: usize, waited: Duration },

    /// The caller cancelled while waiting
    #[error("pool acquire cancelled")]
    Cancelled,

    /// The pool was closed
    #[error("connection pool closed")]
    Closed,

    /// Opening a new handle did not finish within what was left of the
    /// acquire timeout
    #[error("opening pooled handle timed out after {waited:?}")]
    CreateTimeout { waited: Duration },

    /// The manager failed to open a new handle
    #[error("failed to create pooled handle")]
    Create {
        #[source]
        source: E,
    },
}

/// Pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum handles checked out at once
    pub size: usize,
    /// Default wait for a free handle
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 4, acquire_timeout: Duration::from_secs(5) }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.size == 0 {
            return Err(ConfigError::Invalid {
                message: "pool size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Metrics for pool monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub size: usize,
    pub in_use: usize,
    pub idle: usize,
    pub created: u64,
    pub discarded: u64,
    pub timeouts: u64,
}

impl PoolMetrics {
    /// Fraction of the pool currently checked out (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.in_use as f64 / self.size as f64
    }

    pub fn status_message(&self) -> String {
        format!(
            "Pool: {}/{} in use ({:.1}% utilized), {} idle, {} timeouts",
            self.in_use,
            self.size,
            self.utilization() * 100.0,
            self.idle,
            self.timeouts
        )
    }
}

struct PoolShared<M: HandleManager> {
    manager: M,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<M::Handle>>,
    created: AtomicU64,
    discarded: AtomicU64,
    timeouts: AtomicU64,
}

impl<M: HandleManager> PoolShared<M> {
    fn put_back(&self, handle: M::Handle) {
        if self.manager.is_reusable(&handle) {
            self.idle.lock().push(handle);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!("Dropping handle that is no longer reusable");
        }
    }
}

/// Semaphore-bounded handle pool. Clones share the same handles.
pub struct ConnectionPool<M: HandleManager> {
    shared: Arc<PoolShared<M>>,
}

impl<M: HandleManager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<M: HandleManager> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.shared.config.size)
            .field("in_use", &self.in_use())
            .finish()
    }
}

impl<M: HandleManager> ConnectionPool<M> {
    pub fn new(config: PoolConfig, manager: M) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                semaphore: Arc::new(Semaphore::new(config.size)),
                idle: Mutex::new(Vec::with_capacity(config.size)),
                manager,
                config,
                created: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Check out a handle, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Exhausted`] when every handle stays busy for `timeout`
    /// - [`PoolError::Cancelled`] when `cancel` fires first
    /// - [`PoolError::CreateTimeout`] when opening a new handle outlives
    ///   `timeout`, measured from the start of the call
    /// - [`PoolError::Create`] when a new handle cannot be opened (the slot
    ///   is released)
    #[instrument(skip(self, cancel), fields(size = self.shared.config.size))]
    pub async fn acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PooledHandle<M>, PoolError<M::Error>> {
        let started = tokio::time::Instant::now();
        let semaphore = Arc::clone(&self.shared.semaphore);
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PoolError::Cancelled),
            waited = tokio::time::timeout(timeout, semaphore.acquire_owned()) => match waited {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::Closed),
                Err(_) => {
                    self.shared.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(timeout_ms = timeout.as_millis() as u64, "Pool acquire timed out");
                    return Err(PoolError::Exhausted {
                        size: self.shared.config.size,
                        waited: timeout,
                    });
                }
            },
        };

        let idle = self.shared.idle.lock().pop();
        let handle = match idle {
            Some(handle) => handle,
            None => {
                let created = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(PoolError::Cancelled),
                    created = tokio::time::timeout_at(started + timeout, self.shared.manager.create()) => created,
                };
                let Ok(created) = created else {
                    let waited = started.elapsed();
                    warn!(waited_ms = waited.as_millis() as u64, "Opening pooled handle timed out");
                    return Err(PoolError::CreateTimeout { waited });
                };
                let handle = created.map_err(|source| PoolError::Create { source })?;
                self.shared.created.fetch_add(1, Ordering::Relaxed);
                debug!("Opened new pooled handle");
                handle
            }
        };

        Ok(PooledHandle {
            handle: Some(handle),
            shared: Arc::clone(&self.shared),
            discard: false,
            _permit: permit,
        })
    }

    /// Check out a handle using the configured acquire timeout
    pub async fn acquire_default(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PooledHandle<M>, PoolError<M::Error>> {
        self.acquire(self.shared.config.acquire_timeout, cancel).await
    }

    /// Return a handle to the pool. Equivalent to dropping the guard.
    pub fn release(&self, handle: PooledHandle<M>) {
        drop(handle);
    }

    /// Stop handing out handles; pending and future acquires fail with
    /// [`PoolError::Closed`].
    pub fn close(&self) {
        self.shared.semaphore.close();
        self.shared.idle.lock().clear();
    }

    pub fn in_use(&self) -> usize {
        self.shared.config.size.saturating_sub(self.shared.semaphore.available_permits())
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            size: self.shared.config.size,
            in_use: self.in_use(),
            idle: self.shared.idle.lock().len(),
            created: self.shared.created.load(Ordering::Acquire),
            discarded: self.shared.discarded.load(Ordering::Acquire),
            timeouts: self.shared.timeouts.load(Ordering::Acquire),
        }
    }
}

/// A checked-out handle. Returns to the pool on drop.
pub struct PooledHandle<M: HandleManager> {
    handle: Option<M::Handle>,
    shared: Arc<PoolShared<M>>,
    discard: bool,
    // Dropped after `Drop::drop` has put the handle back.
    _permit: OwnedSemaphorePermit,
}

impl<M: HandleManager> PooledHandle<M> {
    /// Mark the handle broken so it is closed instead of reused
    pub fn discard(mut self) {
        self.discard = true;
    }
}

impl<M: HandleManager> Deref for PooledHandle<M> {
    type Target = M::Handle;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the handle out.
        match self.handle.as_ref() {
            Some(handle) => handle,
            None => unreachable!("pooled handle accessed after release"),
        }
    }
}

impl<M: HandleManager> DerefMut for PooledHandle<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.handle.as_mut() {
            Some(handle) => handle,
            None => unreachable!("pooled handle accessed after release"),
        }
    }
}

impl<M: HandleManager> fmt::Debug for PooledHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle").field("discard", &self.discard).finish()
    }
}

impl<M: HandleManager> Drop for PooledHandle<M> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.discard {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            } else {
                self.shared.put_back(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the handle pool.

    use std::collections::HashSet;
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[derive(Debug, Error)]
    #[error("cannot connect")]
    struct ConnectFailed;

    #[derive(Default)]
    struct Counter {
        next: AtomicU32,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl HandleManager for Counter {
        type Handle = u32;
        type Error = ConnectFailed;

        async fn create(&self) -> Result<u32, ConnectFailed> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ConnectFailed);
            }
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn pool(size: usize) -> ConnectionPool<Counter> {
        ConnectionPool::new(
            PoolConfig { size, acquire_timeout: Duration::from_millis(100) },
            Counter::default(),
        )
        .expect("valid pool")
    }

    /// Validates zero-sized pools are rejected.
    #[test]
    fn test_zero_size_rejected() {
        let result = ConnectionPool::new(
            PoolConfig { size: 0, acquire_timeout: Duration::from_secs(1) },
            Counter::default(),
        );
        assert!(result.is_err());
    }

    /// Validates handles are reused after release.
    ///
    /// Assertions:
    /// - The second checkout receives the first handle back.
    /// - Only one handle is ever created.
    #[tokio::test]
    async fn test_handles_are_reused() {
        let pool = pool(2);
        let cancel = CancellationToken::new();
        let first = pool.acquire_default(&cancel).await.expect("first");
        let id = *first;
        pool.release(first);
        let second = pool.acquire_default(&cancel).await.expect("second");
        assert_eq!(*second, id);
        assert_eq!(pool.metrics().created, 1);
    }

    /// Validates a full pool times out with `Exhausted`.
    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_timeout() {
        let pool = pool(1);
        let cancel = CancellationToken::new();
        let _held = pool.acquire_default(&cancel).await.expect("held");
        let err = pool.acquire(Duration::from_millis(50), &cancel).await.expect_err("exhausted");
        assert!(matches!(err, PoolError::Exhausted { size: 1, .. }));
        assert_eq!(pool.metrics().timeouts, 1);
    }

    /// Validates a hanging handle factory is cut off by the acquire timeout
    /// and the slot is freed.
    #[tokio::test(start_paused = true)]
    async fn test_slow_create_bounded_by_timeout() {
        let pool = ConnectionPool::new(
            PoolConfig { size: 1, acquire_timeout: Duration::from_secs(1) },
            Counter { delay: Duration::from_secs(30), ..Counter::default() },
        )
        .expect("valid pool");
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let err = pool.acquire(Duration::from_millis(200), &cancel).await.expect_err("timeout");

        assert!(matches!(err, PoolError::CreateTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.metrics().created, 0);
    }

    /// Validates concurrent holders never share a handle.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_handle_shared_between_holders() {
        let pool = pool(3);
        let cancel = CancellationToken::new();
        let a = pool.acquire_default(&cancel).await.expect("a");
        let b = pool.acquire_default(&cancel).await.expect("b");
        let c = pool.acquire_default(&cancel).await.expect("c");
        let ids: HashSet<u32> = [*a, *b, *c].into_iter().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(pool.in_use(), 3);
    }

    /// Validates discarded handles are not reused.
    #[tokio::test]
    async fn test_discarded_handle_not_reused() {
        let pool = pool(1);
        let cancel = CancellationToken::new();
        let first = pool.acquire_default(&cancel).await.expect("first");
        let id = *first;
        first.discard();
        let second = pool.acquire_default(&cancel).await.expect("second");
        assert_ne!(*second, id);
        assert_eq!(pool.metrics().discarded, 1);
    }

    /// Validates a failed create releases the slot.
    #[tokio::test]
    async fn test_create_failure_releases_slot() {
        let pool = ConnectionPool::new(
            PoolConfig { size: 1, acquire_timeout: Duration::from_millis(20) },
            Counter { next: AtomicU32::new(0), fail: true, delay: Duration::ZERO },
        )
        .expect("valid pool");
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            let err = pool.acquire_default(&cancel).await.expect_err("create fails");
            assert!(matches!(err, PoolError::Create { .. }));
        }
        assert_eq!(pool.in_use(), 0);
    }

    /// Validates cancellation wins over waiting.
    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let pool = pool(1);
        let cancel = CancellationToken::new();
        let _held = pool.acquire_default(&cancel).await.expect("held");
        let waiter_cancel = CancellationToken::new();
        waiter_cancel.cancel();
        let err = pool.acquire(Duration::from_secs(5), &waiter_cancel).await.expect_err("cancel");
        assert!(matches!(err, PoolError::Cancelled));
    }

    /// Validates `close` fails later acquires.
    #[tokio::test]
    async fn test_close() {
        let pool = pool(1);
        pool.close();
        let err = pool.acquire_default(&CancellationToken::new()).await.expect_err("closed");
        assert!(matches!(err, PoolError::Closed));
    }
}
