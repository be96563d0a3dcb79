use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use tixlens_domain::{MetricMap, Ticket};

use super::round2;
use crate::analysis::ports::{put, CalculatorError, MetricsCalculator};

const BY_GROUP: &str = "velocity.by_group";
const WEEKLY: &str = "velocity.weekly_resolved";
const AVG_PER_WEEK: &str = "velocity.avg_per_week";

/// Group name used for tickets without a resolver group
pub const UNASSIGNED_GROUP: &str = "unassigned";

/// Resolved-ticket throughput per resolver group and per ISO week.
///
/// Weeks between the first and last resolution with nothing resolved are
/// reported as zero, and count toward the weekly average.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamVelocityCalculator;

impl MetricsCalculator for TeamVelocityCalculator {
    fn name(&self) -> &str {
        "team_velocity"
    }

    fn names(&self) -> Vec<String> {
        [BY_GROUP, WEEKLY, AVG_PER_WEEK].map(String::from).to_vec()
    }

    fn calculate(&self, tickets: &[Ticket]) -> Result<MetricMap, CalculatorError> {
        let mut by_group: BTreeMap<&str, usize> = BTreeMap::new();
        let mut weeks: BTreeMap<NaiveDate, usize> = BTreeMap::new();

        for ticket in tickets {
            let Some(resolved_at) = ticket.resolved_at.filter(|_| ticket.status.is_resolved()) else {
                continue;
            };
            let group = ticket.resolver_group.as_deref().unwrap_or(UNASSIGNED_GROUP);
            *by_group.entry(group).or_default() += 1;
            *weeks.entry(week_start(resolved_at.date_naive())?).or_default() += 1;
        }

        let weekly = zero_filled(&weeks)?;
        let resolved: usize = weeks.values().sum();
        let avg = if weekly.is_empty() { 0.0 } else { round2(resolved as f64 / weekly.len() as f64) };

        let mut metrics = MetricMap::new();
        put(&mut metrics, BY_GROUP, &by_group)?;
        put(&mut metrics, WEEKLY, &weekly)?;
        put(&mut metrics, AVG_PER_WEEK, avg)?;
        Ok(metrics)
    }
}

/// Monday of the ISO week containing `date`
fn week_start(date: NaiveDate) -> Result<NaiveDate, CalculatorError> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .ok_or_else(|| CalculatorError::InvalidInput(format!("date out of range: {date}")))
}

fn iso_week_key(monday: NaiveDate) -> String {
    let week = monday.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Every week from the first to the last populated one, keyed `YYYY-Www`
fn zero_filled(weeks: &BTreeMap<NaiveDate, usize>) -> Result<BTreeMap<String, usize>, CalculatorError> {
    let mut filled = BTreeMap::new();
    let (Some(first), Some(last)) = (weeks.keys().next(), weeks.keys().next_back()) else {
        return Ok(filled);
    };

    let mut monday = *first;
    while monday <= *last {
        filled.insert(iso_week_key(monday), weeks.get(&monday).copied().unwrap_or(0));
        monday = monday
            .checked_add_days(Days::new(7))
            .ok_or_else(|| CalculatorError::InvalidInput(format!("date out of range: {monday}")))?;
    }
    Ok(filled)
}
