//! Resilient access to the remote ticket service
//!
//! - **[`ports`]**: the `TicketRemote` boundary implemented by adapters
//! - **[`errors`]**: `ServiceError` with its kind and aborting layer
//! - **[`client`]**: `ResilientServiceClient` composing session, breaker,
//!   pool, and retry around each call

pub mod client;
pub mod errors;
pub mod ports;

pub use client::{ClientHealth, RemoteHandles, ResilientServiceClient, ResilientServiceClientBuilder};
pub use errors::{ErrorLayer, ServiceError, ServiceErrorKind, ServiceResult};
pub use ports::TicketRemote;
