//! Configuration loader
//!
//! Loads [`ClientSettings`] from a file, environment variables, or both.
//!
//! ## Loading Strategy
//! 1. Start from the file named by `TIXLENS_CONFIG`, or the first file found
//!    by [`probe_config_paths`], or built-in defaults when there is none
//! 2. Overlay any `TIXLENS_*` variables that are set
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `TIXLENS_REMOTE_BASE_URL`, `TIXLENS_REMOTE_REQUEST_TIMEOUT_MS`
//! - `TIXLENS_POOL_SIZE`, `TIXLENS_POOL_ACQUIRE_TIMEOUT_MS`
//! - `TIXLENS_RETRY_MAX_ATTEMPTS`, `TIXLENS_RETRY_BASE_DELAY_MS`,
//!   `TIXLENS_RETRY_MAX_DELAY_MS`, `TIXLENS_RETRY_BACKOFF_FACTOR`,
//!   `TIXLENS_RETRY_JITTER` (true/false)
//! - `TIXLENS_BREAKER_FAILURE_THRESHOLD`, `TIXLENS_BREAKER_OPEN_DURATION_MS`
//! - `TIXLENS_AUTH_HELPER_TIMEOUT_MS`, `TIXLENS_AUTH_SESSION_TTL_SECS`,
//!   `TIXLENS_AUTH_EXPIRY_SKEW_SECS`, `TIXLENS_AUTH_HELPER_COMMAND`
//!   (whitespace-separated program and arguments)
//! - `TIXLENS_SEARCH_MAX_RESULTS_CEILING`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tixlens.toml`, `./tixlens.json`, `./config.toml`, `./config.json`
//! 2. The same names one and two directories up
//! 3. The same names next to the executable

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tixlens_domain::{ClientSettings, Result, TixLensError};

/// Names an explicit config file, skipping the probe
pub const CONFIG_PATH_VAR: &str = "TIXLENS_CONFIG";

const FILE_NAMES: [&str; 4] = ["tixlens.toml", "tixlens.json", "config.toml", "config.json"];

/// Load settings: optional file, then environment overlay
///
/// # Errors
/// Returns `TixLensError::Config` if:
/// - `TIXLENS_CONFIG` names a file that does not exist
/// - The file cannot be parsed
/// - A `TIXLENS_*` variable has an invalid value
/// - The merged settings fail validation
pub fn load() -> Result<ClientSettings> {
    let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    let mut settings = match explicit.or_else(probe_config_paths) {
        Some(path) => read_file(&path)?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            ClientSettings::default()
        }
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    settings.validate()?;
    tracing::info!(
        base_url = %settings.remote.base_url,
        pool_size = settings.pool.size,
        "Configuration loaded"
    );
    Ok(settings)
}

/// Defaults plus environment overrides; no file is read
///
/// # Errors
/// Returns `TixLensError::Config` for invalid values or settings that fail
/// validation.
pub fn load_from_env() -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML, detected by extension. Fields missing from the file keep their
/// defaults.
///
/// # Errors
/// Returns `TixLensError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The settings fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientSettings> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| {
            TixLensError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };
    let settings = read_file(&config_path)?;
    settings.validate()?;
    Ok(settings)
}

fn read_file(path: &Path) -> Result<ClientSettings> {
    if !path.exists() {
        return Err(TixLensError::Config(format!("Config file not found: {}", path.display())));
    }
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| TixLensError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse settings from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TixLensError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TixLensError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TixLensError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

/// Overlay `TIXLENS_*` values from `lookup` onto `settings`
///
/// `lookup` is usually `std::env::var(..).ok()`; tests pass a map.
///
/// # Errors
/// Returns `TixLensError::Config` naming the variable whose value does not
/// parse. Does not validate the merged result.
pub fn apply_env_overrides<F>(settings: &mut ClientSettings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = var("TIXLENS_REMOTE_BASE_URL") {
        settings.remote.base_url = url;
    }
    parse_into(&var, "TIXLENS_REMOTE_REQUEST_TIMEOUT_MS", &mut settings.remote.request_timeout_ms)?;

    parse_into(&var, "TIXLENS_POOL_SIZE", &mut settings.pool.size)?;
    parse_into(&var, "TIXLENS_POOL_ACQUIRE_TIMEOUT_MS", &mut settings.pool.acquire_timeout_ms)?;

    parse_into(&var, "TIXLENS_RETRY_MAX_ATTEMPTS", &mut settings.retry.max_attempts)?;
    parse_into(&var, "TIXLENS_RETRY_BASE_DELAY_MS", &mut settings.retry.base_delay_ms)?;
    parse_into(&var, "TIXLENS_RETRY_MAX_DELAY_MS", &mut settings.retry.max_delay_ms)?;
    parse_into(&var, "TIXLENS_RETRY_BACKOFF_FACTOR", &mut settings.retry.backoff_factor)?;
    if let Some(raw) = var("TIXLENS_RETRY_JITTER") {
        settings.retry.jitter = parse_bool("TIXLENS_RETRY_JITTER", &raw)?;
    }

    parse_into(
        &var,
        "TIXLENS_BREAKER_FAILURE_THRESHOLD",
        &mut settings.circuit_breaker.failure_threshold,
    )?;
    parse_into(
        &var,
        "TIXLENS_BREAKER_OPEN_DURATION_MS",
        &mut settings.circuit_breaker.open_duration_ms,
    )?;

    parse_into(&var, "TIXLENS_AUTH_HELPER_TIMEOUT_MS", &mut settings.auth.helper_timeout_ms)?;
    parse_into(&var, "TIXLENS_AUTH_SESSION_TTL_SECS", &mut settings.auth.default_session_ttl_secs)?;
    parse_into(&var, "TIXLENS_AUTH_EXPIRY_SKEW_SECS", &mut settings.auth.expiry_skew_secs)?;
    if let Some(command) = var("TIXLENS_AUTH_HELPER_COMMAND") {
        settings.auth.helper_command = command.split_whitespace().map(str::to_string).collect();
    }

    parse_into(
        &var,
        "TIXLENS_SEARCH_MAX_RESULTS_CEILING",
        &mut settings.search.max_results_ceiling,
    )?;

    Ok(())
}

fn parse_into<T>(var: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = var(key) {
        *target = raw
            .parse()
            .map_err(|e| TixLensError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(TixLensError::Config(format!("Invalid value for {key}: '{other}' is not a boolean"))),
    }
}
