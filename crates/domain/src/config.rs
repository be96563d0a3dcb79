//! Client settings
//!
//! One immutable [`ClientSettings`] value is handed to the resilient client
//! and analysis service at construction. Every field has a default so a
//! partial TOML or JSON file is enough.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{Result, TixLensError};
use crate::types::Severity;

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub auth: AuthSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub pool: PoolSettings,
    pub remote: RemoteSettings,
    pub search: SearchSettings,
    pub sanitizer: SanitizerSettings,
    pub analysis: AnalysisSettings,
}

impl ClientSettings {
    /// Reject settings the resilience layer cannot run with
    ///
    /// # Errors
    /// `TixLensError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pool.size == 0 {
            return Err(invalid("pool.size", "must be greater than zero"));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid("circuit_breaker.failure_threshold", "must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be greater than zero"));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(invalid("retry.backoff_factor", "must be a finite number >= 1.0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid("retry.base_delay_ms", "must not exceed retry.max_delay_ms"));
        }
        if self.search.max_results_ceiling == 0 {
            return Err(invalid("search.max_results_ceiling", "must be greater than zero"));
        }
        if self.remote.request_timeout_ms == 0 {
            return Err(invalid("remote.request_timeout_ms", "must be greater than zero"));
        }
        if self.auth.helper_timeout_ms == 0 {
            return Err(invalid("auth.helper_timeout_ms", "must be greater than zero"));
        }
        if let Some(key) =
            self.analysis.sla_hours.keys().find(|key| key.parse::<Severity>().is_err())
        {
            return Err(invalid("analysis.sla_hours", &format!("has unknown severity '{key}'")));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> TixLensError {
    TixLensError::Config(format!("{field} {reason}"))
}

/// Credential helper and session lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub helper_timeout_ms: u64,
    /// Lifetime assumed when the helper reports no expiry
    pub default_session_ttl_secs: u64,
    /// A session this close to expiry is refreshed early
    pub expiry_skew_secs: u64,
    /// Program and arguments of the credential helper, if one is used
    pub helper_command: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            helper_timeout_ms: DEFAULT_HELPER_TIMEOUT_MS,
            default_session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            expiry_skew_secs: DEFAULT_EXPIRY_SKEW_SECS,
            helper_command: Vec::new(),
        }
    }
}

impl AuthSettings {
    pub fn helper_timeout(&self) -> Duration {
        Duration::from_millis(self.helper_timeout_ms)
    }

    pub fn default_session_ttl(&self) -> Duration {
        Duration::from_secs(self.default_session_ttl_secs)
    }

    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_duration_ms: DEFAULT_OPEN_DURATION_MS,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub size: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { size: DEFAULT_POOL_SIZE, acquire_timeout_ms: DEFAULT_POOL_ACQUIRE_TIMEOUT_MS }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RemoteSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub max_results_ceiling: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { max_results_ceiling: DEFAULT_MAX_RESULTS_CEILING }
    }
}

/// Ticket fields the sanitizer scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizedField {
    Title,
    Description,
    Assignee,
    ResolverGroup,
    Tags,
}

/// User-supplied detection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPatternSetting {
    /// snake_case kind name; the placeholder is its uppercase form
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerSettings {
    pub fields: Vec<SanitizedField>,
    /// Built-in kind names (`email`, `phone`, ...); empty enables all
    pub enabled_kinds: Vec<String>,
    pub custom_patterns: Vec<CustomPatternSetting>,
}

impl Default for SanitizerSettings {
    fn default() -> Self {
        Self {
            fields: vec![
                SanitizedField::Title,
                SanitizedField::Description,
                SanitizedField::Assignee,
                SanitizedField::Tags,
            ],
            enabled_kinds: Vec::new(),
            custom_patterns: Vec::new(),
        }
    }
}

/// SLA targets keyed by severity name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub sla_hours: BTreeMap<String, u64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        let sla_hours = BTreeMap::from([
            (Severity::Critical.to_string(), DEFAULT_SLA_CRITICAL_HOURS),
            (Severity::High.to_string(), DEFAULT_SLA_HIGH_HOURS),
            (Severity::Medium.to_string(), DEFAULT_SLA_MEDIUM_HOURS),
            (Severity::Low.to_string(), DEFAULT_SLA_LOW_HOURS),
        ]);
        Self { sla_hours }
    }
}

impl AnalysisSettings {
    /// Target for `severity`, falling back to the built-in default
    pub fn sla_target(&self, severity: Severity) -> Duration {
        let hours = self.sla_hours.get(severity.as_key()).copied().unwrap_or(match severity {
            Severity::Critical => DEFAULT_SLA_CRITICAL_HOURS,
            Severity::High => DEFAULT_SLA_HIGH_HOURS,
            Severity::Medium => DEFAULT_SLA_MEDIUM_HOURS,
            Severity::Low => DEFAULT_SLA_LOW_HOURS,
        });
        Duration::from_secs(hours.saturating_mul(3_600))
    }
}
