//! Ticket records as returned by the remote service

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle status of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Open,
    InProgress,
    Pending,
    Resolved,
    Closed,
    Cancelled,
}

impl_domain_status_conversions!(TicketStatus {
    New => "new",
    Open => "open",
    InProgress => "in_progress",
    Pending => "pending",
    Resolved => "resolved",
    Closed => "closed",
    Cancelled => "cancelled",
});

impl TicketStatus {
    pub const ALL: [TicketStatus; 7] = [
        TicketStatus::New,
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::Cancelled,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Work on the ticket has finished (successfully or not)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed | Self::Cancelled)
    }

    /// The ticket was actually fixed, not abandoned
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// Business impact of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl_domain_status_conversions!(Severity {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];

    /// Lowercase name used in settings and metric keys
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// An incident or service request.
///
/// Immutable once received; sanitization produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub status: TicketStatus,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_group: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Ticket {
    /// Minimal ticket; `updated_at` starts equal to `created_at`
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        status: TicketStatus,
        severity: Severity,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            severity,
            created_at,
            updated_at: created_at,
            resolved_at: None,
            assignee: None,
            resolver_group: None,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn resolved(mut self, at: DateTime<Utc>) -> Self {
        self.resolved_at = Some(at);
        self.updated_at = self.updated_at.max(at);
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    #[must_use]
    pub fn with_resolver_group(mut self, group: impl Into<String>) -> Self {
        self.resolver_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Time from creation to resolution.
    ///
    /// `None` for unresolved tickets and for records whose resolution stamp
    /// precedes creation.
    pub fn resolution_time(&self) -> Option<Duration> {
        if !self.status.is_resolved() {
            return None;
        }
        let resolved_at = self.resolved_at?;
        (resolved_at >= self.created_at).then(|| resolved_at - self.created_at)
    }
}
