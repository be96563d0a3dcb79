//! Domain types and models

pub mod analysis;
pub mod criteria;
pub mod ticket;

pub use analysis::{AnalysisReport, AnalysisResult, MetricMap};
pub use criteria::{CriteriaError, SearchCriteria, SearchCriteriaBuilder, TicketQuery};
pub use ticket::{Severity, Ticket, TicketStatus};
