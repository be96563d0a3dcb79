//! # TixLens Domain
//!
//! Business domain types for TixLens.
//!
//! This crate contains:
//! - Ticket, search criteria, and analysis result types
//! - Domain error types and Result definitions
//! - Client settings
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other TixLens crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
