//! Scriptable in-memory `TicketRemote`

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tixlens_core::{ServiceError, ServiceResult, TicketRemote};
use tixlens_domain::{Ticket, TicketQuery};

/// Handle id, unique per `open_handle` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeHandle(pub u32);

/// Answers searches from a script first, then from per-group or default
/// ticket lists.
#[derive(Default)]
pub struct FakeRemote {
    script: Mutex<VecDeque<ServiceResult<Vec<Ticket>>>>,
    tickets: Vec<Ticket>,
    by_group: HashMap<String, Vec<Ticket>>,
    failing_groups: Vec<String>,
    delay: Duration,
    calls: AtomicU32,
    opened: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    queries: Mutex<Vec<TicketQuery>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tickets(mut self, tickets: Vec<Ticket>) -> Self {
        self.tickets = tickets;
        self
    }

    pub fn with_group(mut self, group: &str, tickets: Vec<Ticket>) -> Self {
        self.by_group.insert(group.to_string(), tickets);
        self
    }

    pub fn with_failing_group(mut self, group: &str) -> Self {
        self.failing_groups.push(group.to_string());
        self
    }

    /// Every remote call takes this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue outcomes for the next searches, in order
    pub fn script(self, outcomes: impl IntoIterator<Item = ServiceResult<Vec<Ticket>>>) -> Self {
        self.script.lock().expect("script lock").extend(outcomes);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn handles_opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<TicketQuery> {
        self.queries.lock().expect("queries lock").clone()
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TicketRemote for FakeRemote {
    type Handle = FakeHandle;

    async fn open_handle(&self) -> ServiceResult<FakeHandle> {
        Ok(FakeHandle(self.opened.fetch_add(1, Ordering::SeqCst)))
    }

    async fn search(&self, _handle: &FakeHandle, query: &TicketQuery) -> ServiceResult<Vec<Ticket>> {
        self.queries.lock().expect("queries lock").push(query.clone());
        self.enter().await;

        if let Some(outcome) = self.script.lock().expect("script lock").pop_front() {
            return outcome;
        }
        match query.resolver_group.as_deref() {
            Some(group) if self.failing_groups.iter().any(|g| g == group) => {
                Err(ServiceError::rejected(400, format!("unknown group {group}")))
            }
            Some(group) => Ok(self.by_group.get(group).cloned().unwrap_or_default()),
            None => Ok(self.tickets.clone()),
        }
    }

    async fn get(&self, _handle: &FakeHandle, id: &str) -> ServiceResult<Option<Ticket>> {
        self.enter().await;
        Ok(self.tickets.iter().find(|t| t.id == id).cloned())
    }
}
