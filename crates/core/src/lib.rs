//! # TixLens Core
//!
//! Business logic layer - no HTTP, process, or file system code.
//!
//! This crate contains:
//! - The `TicketRemote` port and the resilient client built around it
//! - Ticket sanitization
//! - The analysis engine, built-in calculators, and the analysis service
//!
//! ## Architecture Principles
//! - Only depends on `tixlens-common` and `tixlens-domain`
//! - All external access via traits
//! - Pure, testable business logic

pub mod analysis;
pub mod sanitize;
pub mod ticketing;

pub use analysis::{
    AnalysisEngine, AnalysisEngineBuilder, CalculatorError, MetricsCalculator,
    TicketAnalysisService,
};
pub use sanitize::{SanitizationResult, Sanitizer};
pub use ticketing::{
    ClientHealth, ErrorLayer, ResilientServiceClient, ResilientServiceClientBuilder, ServiceError,
    ServiceErrorKind, ServiceResult, TicketRemote,
};
