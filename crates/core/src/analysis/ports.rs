//! Port interfaces for metric calculation

use thiserror::Error;
use tixlens_domain::{MetricMap, Ticket};

/// Why a calculator produced no metrics
#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to encode metric '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Failed(String),
}

/// One pluggable metric producer.
///
/// Calculators are pure over the ticket slice and must return a defined
/// output for an empty slice. A calculator that errors or panics is
/// recorded by [`name`](Self::name) in the analysis result and contributes
/// no metrics.
pub trait MetricsCalculator: Send + Sync {
    /// Identifier reported when this calculator fails
    fn name(&self) -> &str;

    /// Metric keys this calculator emits
    fn names(&self) -> Vec<String>;

    fn calculate(&self, tickets: &[Ticket]) -> Result<MetricMap, CalculatorError>;
}

/// Insert `value` under `name`, mapping serialization failures
pub(crate) fn put<T: serde::Serialize>(
    metrics: &mut MetricMap,
    name: &str,
    value: T,
) -> Result<(), CalculatorError> {
    let encoded = serde_json::to_value(value)
        .map_err(|source| CalculatorError::Encode { name: name.to_string(), source })?;
    metrics.insert(name.to_string(), encoded);
    Ok(())
}
