//! Process-wide `tracing` subscriber setup

use std::str::FromStr;

use tixlens_domain::{Result, TixLensError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives, e.g. `info,tixlens_core=debug`
pub const LOG_FILTER_VAR: &str = "TIXLENS_LOG";

/// `pretty` or `json`
pub const LOG_FORMAT_VAR: &str = "TIXLENS_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output for development
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Format named by `TIXLENS_LOG_FORMAT`, or [`LogFormat::Pretty`]
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_VAR).ok().and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = TixLensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TixLensError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed (by an
/// earlier call or by the host application), leaving it in place.
pub fn init_logging(format: LogFormat) -> Result<bool> {
    let json_layer = (format == LogFormat::Json)
        .then(|| fmt::layer().json().with_target(true).with_current_span(true));
    let pretty_layer = (format == LogFormat::Pretty).then(|| fmt::layer().with_target(true));

    match tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
    {
        Ok(()) => {
            tracing::debug!(?format, "Logging initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
