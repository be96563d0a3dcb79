//! Logging setup

pub mod logging;

pub use logging::{init_logging, LogFormat, LOG_FILTER_VAR, LOG_FORMAT_VAR};
