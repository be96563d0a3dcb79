//! Authenticated session management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthSession   │  validity flag + issued/expires timestamps
//! └────────┬────────┘
//!          │ serialized refresh, bounded wait
//!          ▼
//! ┌─────────────────┐
//! │CredentialHelper │  port: check_or_refresh() -> SessionExpiry
//! └─────────────────┘
//! ```
//!
//! The session never sees tokens, passwords, or helper output. Whatever
//! proves identity to the remote service stays inside the helper (a
//! platform credential store, a vendor CLI, ...). The session only learns
//! whether the helper succeeded and, optionally, when the credential
//! expires.
//!
//! # Module Organization
//!
//! - **[`types`]**: `SessionExpiry`, `SessionSnapshot`, `AuthError`
//! - **[`traits`]**: the `CredentialHelper` port
//! - **[`session`]**: `AuthSession` lifecycle

pub mod session;
pub mod traits;
pub mod types;

pub use session::{AuthSession, AuthSessionConfig};
pub use traits::CredentialHelper;
pub use types::{AuthError, SessionExpiry, SessionSnapshot};
