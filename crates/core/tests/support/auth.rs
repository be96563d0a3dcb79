//! Fake credential helper

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tixlens_common::auth::{AuthError, CredentialHelper, SessionExpiry};

/// Counts runs and answers with a configurable result
pub struct FakeHelper {
    calls: AtomicU32,
    result: Mutex<Result<SessionExpiry, AuthError>>,
    delay: Duration,
}

impl FakeHelper {
    /// Succeeds with a credential valid for an hour
    pub fn ok() -> Self {
        Self::with_result(Ok(SessionExpiry::in_seconds(3_600)))
    }

    pub fn denied() -> Self {
        Self::with_result(Err(AuthError::denied("helper exited with status 1")))
    }

    pub fn with_result(result: Result<SessionExpiry, AuthError>) -> Self {
        Self { calls: AtomicU32::new(0), result: Mutex::new(result), delay: Duration::ZERO }
    }

    /// Every run takes this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialHelper for FakeHelper {
    async fn check_or_refresh(&self) -> Result<SessionExpiry, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.lock().expect("helper lock").clone()
    }
}
