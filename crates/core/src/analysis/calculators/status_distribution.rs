use std::collections::BTreeMap;

use tixlens_domain::{MetricMap, Ticket, TicketStatus};

use super::ratio;
use crate::analysis::ports::{put, CalculatorError, MetricsCalculator};

const COUNTS: &str = "status_distribution.counts";
const OPEN_RATIO: &str = "status_distribution.open_ratio";

/// Ticket counts per status, with every status present even when zero.
///
/// `open_ratio` is the share of non-terminal tickets, `null` for an empty
/// set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusDistributionCalculator;

impl MetricsCalculator for StatusDistributionCalculator {
    fn name(&self) -> &str {
        "status_distribution"
    }

    fn names(&self) -> Vec<String> {
        vec![COUNTS.to_string(), OPEN_RATIO.to_string()]
    }

    fn calculate(&self, tickets: &[Ticket]) -> Result<MetricMap, CalculatorError> {
        let mut counts: BTreeMap<&'static str, usize> =
            TicketStatus::ALL.iter().map(|status| (status.as_key(), 0)).collect();
        for ticket in tickets {
            *counts.entry(ticket.status.as_key()).or_default() += 1;
        }
        let open = tickets.iter().filter(|t| !t.status.is_terminal()).count();

        let mut metrics = MetricMap::new();
        put(&mut metrics, COUNTS, &counts)?;
        put(&mut metrics, OPEN_RATIO, ratio(open, tickets.len()))?;
        Ok(metrics)
    }
}
