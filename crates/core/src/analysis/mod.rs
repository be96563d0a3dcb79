//! Metric calculation over sanitized tickets

pub mod calculators;
pub mod engine;
pub mod ports;
pub mod service;

pub use calculators::{
    ResolutionTimeCalculator, SlaComplianceCalculator, StatusDistributionCalculator,
    TeamVelocityCalculator,
};
pub use engine::{AnalysisEngine, AnalysisEngineBuilder};
pub use ports::{CalculatorError, MetricsCalculator};
pub use service::TicketAnalysisService;
