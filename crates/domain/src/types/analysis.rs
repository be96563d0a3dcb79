//! Output of one analysis run

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric name to JSON value, ordered by name
pub type MetricMap = BTreeMap<String, serde_json::Value>;

/// Aggregated metrics for a set of sanitized tickets.
///
/// Built once by the analysis engine and read-only afterwards. `errors`
/// lists the calculators that failed; their metrics are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub metrics: MetricMap,
    pub ticket_count: usize,
    pub errors: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(
        metrics: MetricMap,
        ticket_count: usize,
        errors: Vec<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self { metrics, ticket_count, errors, generated_at }
    }

    pub fn metric(&self, name: &str) -> Option<&serde_json::Value> {
        self.metrics.get(name)
    }

    /// Every calculator succeeded
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of the search → sanitize → analyze pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub result: AnalysisResult,
    /// Total placeholders written across all tickets
    pub redactions: usize,
}
