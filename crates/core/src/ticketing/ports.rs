//! Port interfaces for the remote ticket service
//!
//! These traits define the boundary between the resilient client and
//! whatever transport reaches the ticketing system.

use async_trait::async_trait;
use tixlens_domain::{Ticket, TicketQuery};

use super::errors::ServiceResult;

/// Raw access to the remote ticket service.
///
/// Implementations perform exactly one attempt per call; retry, breaker and
/// pooling are layered on by
/// [`ResilientServiceClient`](super::ResilientServiceClient).
#[async_trait]
pub trait TicketRemote: Send + Sync + 'static {
    /// Transport handle checked out of the connection pool for one call
    type Handle: Send + Sync + 'static;

    /// Open a new transport handle
    async fn open_handle(&self) -> ServiceResult<Self::Handle>;

    /// Run a search
    async fn search(&self, handle: &Self::Handle, query: &TicketQuery) -> ServiceResult<Vec<Ticket>>;

    /// Fetch one ticket; `Ok(None)` when the remote does not know the id
    async fn get(&self, handle: &Self::Handle, id: &str) -> ServiceResult<Option<Ticket>>;

    /// Whether a handle that just served a call may be reused
    fn is_reusable(&self, _handle: &Self::Handle) -> bool {
        true
    }
}
