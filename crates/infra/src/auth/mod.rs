//! Credential helper adapters

pub mod process_helper;

pub use process_helper::{ProcessCredentialHelper, INHERITED_ENV};
