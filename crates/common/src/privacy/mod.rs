//! Privacy Module - Portable Core
//!
//! Detection and redaction of sensitive values in free text.

pub mod patterns;

pub use patterns::{PatternMatcher, PiiDetectionConfig, PiiError, PiiResult, PiiType, Redaction};
