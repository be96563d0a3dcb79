//! Calculator composition with per-calculator failure isolation

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use tixlens_domain::{AnalysisResult, AnalysisSettings, MetricMap, Ticket};
use tracing::{debug, error, instrument, warn};

use super::calculators::{
    ResolutionTimeCalculator, SlaComplianceCalculator, StatusDistributionCalculator,
    TeamVelocityCalculator,
};
use super::ports::MetricsCalculator;

/// Runs an ordered list of calculators over one ticket set.
///
/// Calculators run in registration order. When two calculators emit the
/// same metric name the later one wins. A calculator that returns an error
/// or panics is listed in [`AnalysisResult::errors`] and the rest still run.
#[derive(Clone)]
pub struct AnalysisEngine {
    calculators: Vec<Arc<dyn MetricsCalculator>>,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine").field("calculators", &self.calculator_names()).finish()
    }
}

impl AnalysisEngine {
    pub fn builder() -> AnalysisEngineBuilder {
        AnalysisEngineBuilder::default()
    }

    /// Resolution time, status distribution, SLA compliance, and team
    /// velocity, in that order
    pub fn standard(settings: &AnalysisSettings) -> Self {
        Self::builder()
            .calculator(ResolutionTimeCalculator)
            .calculator(StatusDistributionCalculator)
            .calculator(SlaComplianceCalculator::from_settings(settings))
            .calculator(TeamVelocityCalculator)
            .build()
    }

    pub fn calculator_names(&self) -> Vec<&str> {
        self.calculators.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    #[instrument(skip_all, fields(tickets = tickets.len(), calculators = self.calculators.len()))]
    pub fn analyze(&self, tickets: &[Ticket]) -> AnalysisResult {
        let mut metrics = MetricMap::new();
        let mut errors = Vec::new();

        for calculator in &self.calculators {
            let name = calculator.name();
            match panic::catch_unwind(AssertUnwindSafe(|| calculator.calculate(tickets))) {
                Ok(Ok(produced)) => {
                    for (key, value) in produced {
                        if metrics.contains_key(&key) {
                            debug!(calculator = name, metric = %key, "Overwriting metric from earlier calculator");
                        }
                        metrics.insert(key, value);
                    }
                }
                Ok(Err(err)) => {
                    warn!(calculator = name, error = %err, "Calculator failed");
                    errors.push(name.to_string());
                }
                Err(payload) => {
                    error!(calculator = name, panic = %panic_message(payload.as_ref()), "Calculator panicked");
                    errors.push(name.to_string());
                }
            }
        }

        debug!(metrics = metrics.len(), failed = errors.len(), "Analysis complete");
        AnalysisResult::new(metrics, tickets.len(), errors, Utc::now())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Ordered calculator registration
#[derive(Default)]
pub struct AnalysisEngineBuilder {
    calculators: Vec<Arc<dyn MetricsCalculator>>,
}

impl AnalysisEngineBuilder {
    pub fn calculator(mut self, calculator: impl MetricsCalculator + 'static) -> Self {
        self.calculators.push(Arc::new(calculator));
        self
    }

    pub fn shared(mut self, calculator: Arc<dyn MetricsCalculator>) -> Self {
        self.calculators.push(calculator);
        self
    }

    pub fn build(self) -> AnalysisEngine {
        AnalysisEngine { calculators: self.calculators }
    }
}
