//! Port for whatever proves the caller may talk to the remote service
//!
//! Implementations live outside this crate (for example a subprocess that
//! runs a vendor login tool). Tests use in-memory fakes.

use async_trait::async_trait;

use super::types::{AuthError, SessionExpiry};

/// Checks for, or obtains, a valid credential
#[async_trait]
pub trait CredentialHelper: Send + Sync {
    /// Confirm a credential is present, refreshing it if necessary
    ///
    /// # Returns
    /// The expiry of the credential, if the helper knows it
    ///
    /// # Errors
    /// - [`AuthError::Denied`] when the helper reports failure
    /// - [`AuthError::Unavailable`] when the helper cannot be run
    /// - [`AuthError::Timeout`] when the helper enforces its own time limit
    async fn check_or_refresh(&self) -> Result<SessionExpiry, AuthError>;
}
