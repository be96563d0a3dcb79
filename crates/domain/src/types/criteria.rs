//! Search criteria and the normalized query sent to the remote service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ticket::TicketStatus;

/// Rejections raised while normalizing [`SearchCriteria`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("max_results must be greater than zero")]
    ZeroMaxResults,
}

/// Caller-facing search filter.
///
/// Every field is optional; an empty criteria matches everything up to the
/// result ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    pub statuses: Vec<TicketStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub resolver_group: Option<String>,
    pub text: Option<String>,
    pub max_results: Option<u32>,
}

impl SearchCriteria {
    pub fn builder() -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::default()
    }

    /// Validate and canonicalize against `ceiling`.
    ///
    /// - `max_results` above the ceiling is clamped, absent means the ceiling
    /// - blank strings become `None`, others are trimmed
    /// - statuses are sorted and deduplicated
    ///
    /// # Errors
    /// [`CriteriaError::InvertedDateRange`] when `created_after` is later
    /// than `created_before`, [`CriteriaError::ZeroMaxResults`] for an
    /// explicit zero limit.
    pub fn normalized(&self, ceiling: u32) -> Result<SearchCriteria, CriteriaError> {
        if let (Some(start), Some(end)) = (self.created_after, self.created_before) {
            if start > end {
                return Err(CriteriaError::InvertedDateRange { start, end });
            }
        }

        let max_results = match self.max_results {
            Some(0) => return Err(CriteriaError::ZeroMaxResults),
            Some(n) => n.min(ceiling),
            None => ceiling,
        };

        let mut statuses = self.statuses.clone();
        statuses.sort();
        statuses.dedup();

        Ok(SearchCriteria {
            statuses,
            created_after: self.created_after,
            created_before: self.created_before,
            assignee: non_blank(self.assignee.as_deref()),
            resolver_group: non_blank(self.resolver_group.as_deref()),
            text: non_blank(self.text.as_deref()),
            max_results: Some(max_results),
        })
    }

    /// Copy of these criteria restricted to one resolver group
    #[must_use]
    pub fn for_group(&self, group: impl Into<String>) -> Self {
        Self { resolver_group: Some(group.into()), ..self.clone() }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Builder for [`SearchCriteria`]
#[derive(Debug, Default)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
}

impl SearchCriteriaBuilder {
    pub fn status(mut self, status: TicketStatus) -> Self {
        self.criteria.statuses.push(status);
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = TicketStatus>) -> Self {
        self.criteria.statuses.extend(statuses);
        self
    }

    pub fn created_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.criteria.created_after = Some(start);
        self.criteria.created_before = Some(end);
        self
    }

    pub fn created_after(mut self, start: DateTime<Utc>) -> Self {
        self.criteria.created_after = Some(start);
        self
    }

    pub fn created_before(mut self, end: DateTime<Utc>) -> Self {
        self.criteria.created_before = Some(end);
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.criteria.assignee = Some(assignee.into());
        self
    }

    pub fn resolver_group(mut self, group: impl Into<String>) -> Self {
        self.criteria.resolver_group = Some(group.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.criteria.text = Some(text.into());
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.criteria.max_results = Some(max_results);
        self
    }

    pub fn build(self) -> SearchCriteria {
        self.criteria
    }
}

/// Wire-level query built from normalized criteria
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub limit: u32,
}

impl TicketQuery {
    /// Normalize `criteria` against `ceiling` and convert
    ///
    /// # Errors
    /// Propagates [`SearchCriteria::normalized`] rejections.
    pub fn from_criteria(criteria: &SearchCriteria, ceiling: u32) -> Result<Self, CriteriaError> {
        let normalized = criteria.normalized(ceiling)?;
        Ok(Self {
            limit: normalized.max_results.unwrap_or(ceiling),
            statuses: normalized.statuses,
            created_after: normalized.created_after,
            created_before: normalized.created_before,
            assignee: normalized.assignee,
            resolver_group: normalized.resolver_group,
            text: normalized.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn test_inverted_range_rejected() {
        let criteria = SearchCriteria::builder().created_between(day(10), day(2)).build();
        assert_eq!(
            criteria.normalized(100),
            Err(CriteriaError::InvertedDateRange { start: day(10), end: day(2) })
        );
    }

    #[test]
    fn test_equal_bounds_accepted() {
        let criteria = SearchCriteria::builder().created_between(day(3), day(3)).build();
        assert!(criteria.normalized(100).is_ok());
    }

    #[test]
    fn test_max_results_clamped_and_defaulted() {
        let big = SearchCriteria::builder().max_results(10_000).build();
        assert_eq!(big.normalized(500).map(|c| c.max_results), Ok(Some(500)));

        let unset = SearchCriteria::default();
        assert_eq!(unset.normalized(250).map(|c| c.max_results), Ok(Some(250)));

        let zero = SearchCriteria::builder().max_results(0).build();
        assert_eq!(zero.normalized(250), Err(CriteriaError::ZeroMaxResults));
    }

    #[test]
    fn test_blank_strings_and_status_order() {
        let criteria = SearchCriteria::builder()
            .assignee("   ")
            .text("  printer jam ")
            .status(TicketStatus::Resolved)
            .status(TicketStatus::New)
            .status(TicketStatus::Resolved)
            .build();
        let normalized = criteria.normalized(50).expect("valid criteria");
        assert_eq!(normalized.assignee, None);
        assert_eq!(normalized.text.as_deref(), Some("printer jam"));
        assert_eq!(normalized.statuses, vec![TicketStatus::New, TicketStatus::Resolved]);
    }

    #[test]
    fn test_query_serializes_compactly() {
        let criteria = SearchCriteria::builder().resolver_group("network").max_results(20).build();
        let query = TicketQuery::from_criteria(&criteria, 500).expect("valid criteria");
        let json = serde_json::to_value(&query).expect("serialize");
        assert_eq!(json, serde_json::json!({ "resolverGroup": "network", "limit": 20 }));
    }
}
