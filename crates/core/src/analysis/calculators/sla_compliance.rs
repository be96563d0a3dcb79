use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tixlens_domain::{AnalysisSettings, MetricMap, Severity, Ticket};

use super::ratio;
use crate::analysis::ports::{put, CalculatorError, MetricsCalculator};

const COMPLIANCE_RATE: &str = "sla.compliance_rate";
const BREACHED: &str = "sla.breached_count";
const BY_SEVERITY: &str = "sla.by_severity";

#[derive(Debug, Default, Serialize)]
struct SeverityCompliance {
    resolved: usize,
    breached: usize,
    compliance_rate: Option<f64>,
}

/// Share of resolved tickets that met their severity's resolution target.
///
/// Tickets that are not resolved are not judged. A ticket resolved exactly
/// at its target is compliant.
#[derive(Debug, Clone)]
pub struct SlaComplianceCalculator {
    targets: BTreeMap<Severity, Duration>,
}

impl Default for SlaComplianceCalculator {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

impl SlaComplianceCalculator {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        let targets = Severity::ALL
            .iter()
            .map(|&severity| (severity, settings.sla_target(severity)))
            .collect();
        Self { targets }
    }

    pub fn target(&self, severity: Severity) -> Duration {
        self.targets.get(&severity).copied().unwrap_or(Duration::MAX)
    }
}

impl MetricsCalculator for SlaComplianceCalculator {
    fn name(&self) -> &str {
        "sla_compliance"
    }

    fn names(&self) -> Vec<String> {
        [COMPLIANCE_RATE, BREACHED, BY_SEVERITY].map(String::from).to_vec()
    }

    fn calculate(&self, tickets: &[Ticket]) -> Result<MetricMap, CalculatorError> {
        let mut by_severity: BTreeMap<&'static str, SeverityCompliance> = Severity::ALL
            .iter()
            .map(|severity| (severity.as_key(), SeverityCompliance::default()))
            .collect();

        for ticket in tickets {
            let Some(elapsed) = ticket.resolution_time() else {
                continue;
            };
            let entry = by_severity.entry(ticket.severity.as_key()).or_default();
            entry.resolved += 1;
            if elapsed.to_std().is_ok_and(|elapsed| elapsed > self.target(ticket.severity)) {
                entry.breached += 1;
            }
        }

        let mut resolved = 0;
        let mut breached = 0;
        for entry in by_severity.values_mut() {
            entry.compliance_rate = ratio(entry.resolved - entry.breached, entry.resolved);
            resolved += entry.resolved;
            breached += entry.breached;
        }

        let mut metrics = MetricMap::new();
        put(&mut metrics, COMPLIANCE_RATE, ratio(resolved - breached, resolved))?;
        put(&mut metrics, BREACHED, breached)?;
        put(&mut metrics, BY_SEVERITY, &by_severity)?;
        Ok(metrics)
    }
}
