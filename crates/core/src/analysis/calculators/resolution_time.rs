use serde_json::Value;
use tixlens_domain::{MetricMap, Ticket};

use super::{hours, round2};
use crate::analysis::ports::{put, CalculatorError, MetricsCalculator};

const AVG: &str = "resolution_time.avg_hours";
const MEDIAN: &str = "resolution_time.median_hours";
const P90: &str = "resolution_time.p90_hours";
const RESOLVED: &str = "resolution_time.resolved_count";

/// Average, median and 90th percentile time to resolve.
///
/// Only resolved tickets with a usable resolution stamp count. The
/// percentile uses the nearest-rank method. Hour values are `null` when no
/// ticket qualifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionTimeCalculator;

impl MetricsCalculator for ResolutionTimeCalculator {
    fn name(&self) -> &str {
        "resolution_time"
    }

    fn names(&self) -> Vec<String> {
        [AVG, MEDIAN, P90, RESOLVED].map(String::from).to_vec()
    }

    fn calculate(&self, tickets: &[Ticket]) -> Result<MetricMap, CalculatorError> {
        let mut durations: Vec<f64> =
            tickets.iter().filter_map(Ticket::resolution_time).map(hours).collect();
        durations.sort_by(f64::total_cmp);

        let mut metrics = MetricMap::new();
        put(&mut metrics, RESOLVED, durations.len())?;
        if durations.is_empty() {
            for name in [AVG, MEDIAN, P90] {
                metrics.insert(name.to_string(), Value::Null);
            }
            return Ok(metrics);
        }

        let avg = durations.iter().sum::<f64>() / durations.len() as f64;
        put(&mut metrics, AVG, round2(avg))?;
        put(&mut metrics, MEDIAN, round2(median(&durations)))?;
        put(&mut metrics, P90, round2(nearest_rank(&durations, 90)))?;
        Ok(metrics)
    }
}

/// `sorted` must be non-empty
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `sorted` must be non-empty
fn nearest_rank(sorted: &[f64], percentile: usize) -> f64 {
    let rank = (percentile * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1]
}
