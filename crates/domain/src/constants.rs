//! Domain-level defaults
//!
//! Settings fall back to these when a field is absent from the config file.

// Search
pub const DEFAULT_MAX_RESULTS_CEILING: u32 = 500;

// Remote service
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// Circuit breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_OPEN_DURATION_MS: u64 = 30_000;

// Retry
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

// Connection pool
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_POOL_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

// Auth
pub const DEFAULT_HELPER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3_600;
pub const DEFAULT_EXPIRY_SKEW_SECS: u64 = 30;

// SLA targets (hours to resolution)
pub const DEFAULT_SLA_CRITICAL_HOURS: u64 = 4;
pub const DEFAULT_SLA_HIGH_HOURS: u64 = 24;
pub const DEFAULT_SLA_MEDIUM_HOURS: u64 = 72;
pub const DEFAULT_SLA_LOW_HOURS: u64 = 168;
