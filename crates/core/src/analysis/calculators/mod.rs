//! Built-in metric calculators

mod resolution_time;
mod sla_compliance;
mod status_distribution;
mod team_velocity;

pub use resolution_time::ResolutionTimeCalculator;
pub use sla_compliance::SlaComplianceCalculator;
pub use status_distribution::StatusDistributionCalculator;
pub use team_velocity::TeamVelocityCalculator;

/// Hours as a float, at second precision
pub(crate) fn hours(duration: chrono::Duration) -> f64 {
    duration.num_seconds() as f64 / 3_600.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole` rounded, or `None` when `whole` is zero
pub(crate) fn ratio(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| round2(part as f64 / whole as f64))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use tixlens_domain::{Severity, Ticket, TicketStatus};

    pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, hour, 0, 0).single().expect("valid timestamp")
    }

    /// Resolved ticket created on April `day` at 00:00, open for `hours`
    pub fn resolved(id: &str, severity: Severity, day: u32, hours: u32) -> Ticket {
        let created = at(day, 0);
        Ticket::new(id, "resolved", TicketStatus::Resolved, severity, created)
            .resolved(created + chrono::Duration::hours(i64::from(hours)))
    }

    pub fn open(id: &str, status: TicketStatus) -> Ticket {
        Ticket::new(id, "open", status, Severity::Medium, at(1, 0))
    }
}
