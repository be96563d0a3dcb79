//! PII pattern detection and redaction
//!
//! Portable, domain-free building blocks: a [`PatternMatcher`] compiled from
//! a [`PiiDetectionConfig`] that finds and replaces sensitive values with
//! fixed, typed placeholders.

pub mod config;
pub mod core;
pub mod error;
pub mod types;

pub use core::PatternMatcher;

pub use config::{CustomPattern, PiiDetectionConfig};
pub use error::{PiiError, PiiResult};
pub use types::{PiiMatch, PiiType, Redaction};
