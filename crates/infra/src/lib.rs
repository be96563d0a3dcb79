//! # TixLens Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP transport and the REST ticket service adapter
//! - Credential helper backed by an external command
//! - Configuration loading (files and `TIXLENS_*` variables)
//! - Logging setup
//!
//! ## Architecture
//! - Implements traits defined in `tixlens-core` and `tixlens-common`
//! - Contains all "impure" code (network, processes, files)

pub mod auth;
pub mod config;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use auth::ProcessCredentialHelper;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::ticketing::HttpTicketRemote;
pub use observability::{init_logging, LogFormat};
