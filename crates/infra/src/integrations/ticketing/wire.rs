//! Response payloads of the ticket service and their mapping to domain tickets

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tixlens_core::ServiceError;
use tixlens_domain::{Severity, Ticket, TicketStatus};

/// Search results, either wrapped in an envelope or as a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SearchBody {
    Envelope { tickets: Vec<WireTicket> },
    List(Vec<WireTicket>),
}

impl SearchBody {
    pub(crate) fn into_tickets(self) -> Result<Vec<Ticket>, ServiceError> {
        let wire = match self {
            Self::Envelope { tickets } | Self::List(tickets) => tickets,
        };
        wire.into_iter().map(WireTicket::into_ticket).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTicket {
    id: String,
    #[serde(default, alias = "shortDescription")]
    title: String,
    status: String,
    #[serde(alias = "priority")]
    severity: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default, alias = "assignmentGroup")]
    resolver_group: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl WireTicket {
    pub(crate) fn into_ticket(self) -> Result<Ticket, ServiceError> {
        let status = parse_status(&self.status).ok_or_else(|| {
            ServiceError::malformed_response(format!("ticket {} has an unknown status", self.id))
        })?;
        let severity = parse_severity(&self.severity).ok_or_else(|| {
            ServiceError::malformed_response(format!("ticket {} has an unknown severity", self.id))
        })?;

        let mut ticket = Ticket::new(self.id, self.title, status, severity, self.created_at)
            .with_description(self.description.unwrap_or_default())
            .with_tags(self.tags);
        ticket.assignee = self.assignee.filter(|v| !v.trim().is_empty());
        ticket.resolver_group = self.resolver_group.filter(|v| !v.trim().is_empty());
        if let Some(resolved_at) = self.resolved_at {
            ticket = ticket.resolved(resolved_at);
        }
        if let Some(updated_at) = self.updated_at {
            ticket.updated_at = ticket.updated_at.max(updated_at);
        }
        Ok(ticket)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

fn parse_status(raw: &str) -> Option<TicketStatus> {
    let status = match normalize(raw).as_str() {
        "new" => TicketStatus::New,
        "open" | "assigned" | "active" => TicketStatus::Open,
        "in_progress" | "work_in_progress" => TicketStatus::InProgress,
        "pending" | "on_hold" | "waiting" => TicketStatus::Pending,
        "resolved" => TicketStatus::Resolved,
        "closed" => TicketStatus::Closed,
        "cancelled" | "canceled" => TicketStatus::Cancelled,
        _ => return None,
    };
    Some(status)
}

fn parse_severity(raw: &str) -> Option<Severity> {
    let severity = match normalize(raw).as_str() {
        "critical" | "1" | "p1" => Severity::Critical,
        "high" | "2" | "p2" => Severity::High,
        "medium" | "moderate" | "3" | "p3" => Severity::Medium,
        "low" | "4" | "p4" => Severity::Low,
        _ => return None,
    };
    Some(severity)
}
