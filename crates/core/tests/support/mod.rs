//! Shared test helpers for `tixlens-core` integration tests.
//!
//! In-memory fakes for the remote ticket port and the credential helper so
//! the client and analysis tests can focus on behaviour instead of
//! boilerplate.

#![allow(dead_code)]

pub mod auth;
pub mod remote;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tixlens_domain::{Severity, Ticket, TicketStatus};

/// 2024-04-01 (a Monday) plus `hours`
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).single().expect("valid timestamp")
        + Duration::hours(hours)
}

pub fn open_ticket(id: &str) -> Ticket {
    Ticket::new(id, format!("Ticket {id}"), TicketStatus::Open, Severity::Medium, at(0))
}

/// Ticket created at hour 0 and resolved `hours` later
pub fn resolved_ticket(id: &str, severity: Severity, hours: i64) -> Ticket {
    Ticket::new(id, format!("Ticket {id}"), TicketStatus::Resolved, severity, at(0))
        .resolved(at(hours))
}
