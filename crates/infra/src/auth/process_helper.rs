//! Credential helper backed by an external command
//!
//! The command is whatever the deployment uses to log in (a vendor CLI, a
//! wrapper around a platform keychain). It runs with a cleared environment,
//! no stdin, and a hard time limit. Exit status 0 means a valid credential
//! exists; stdout may name its expiry as `expires_in=<seconds>` or as an
//! RFC 3339 timestamp. Neither stdout nor stderr is ever logged.

use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tixlens_common::auth::{AuthError, CredentialHelper, SessionExpiry};
use tixlens_domain::{AuthSettings, TixLensError};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Variables passed through from the parent environment
pub const INHERITED_ENV: [&str; 6] = ["PATH", "HOME", "USER", "LANG", "LC_ALL", "TMPDIR"];

/// Helper output kept for expiry parsing; anything beyond is read and dropped
const MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

/// How long to wait for stdout to close once the helper has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ProcessCredentialHelper {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl ProcessCredentialHelper {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args: Vec::new(), env: Vec::new(), timeout }
    }

    /// Build from `auth.helper_command`: program followed by its arguments
    ///
    /// # Errors
    /// `TixLensError::Config` when no command is configured.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, TixLensError> {
        let (program, args) = settings
            .helper_command
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| TixLensError::Config("auth.helper_command is empty".to_string()))?;
        Ok(Self::new(program.clone(), settings.helper_timeout()).args(args.iter().cloned()))
    }

    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Set a variable for the helper in addition to [`INHERITED_ENV`]
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).env_clear();
        for key in INHERITED_ENV {
            if let Some(value) = std::env::var_os(key) {
                command.env(key, value);
            }
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::null());
        command
    }

    /// Blocking run; call from `spawn_blocking`
    fn run(&self) -> Result<SessionExpiry, AuthError> {
        let mut child = self.command().spawn().map_err(|err| {
            warn!(program = %self.program, error = %err, "Failed to start credential helper");
            AuthError::unavailable(format!("failed to start {}: {}", self.program, err.kind()))
        })?;

        // Drain stdout while waiting so a chatty helper cannot block on a
        // full pipe.
        let output = child.stdout.take().map(drain);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(
                    program = %self.program,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Credential helper timed out, killing process"
                );
                kill_and_reap(&mut child);
                return Err(AuthError::Timeout { waited: self.timeout });
            }
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(AuthError::unavailable(format!("failed to wait for helper: {}", err.kind())));
            }
        };

        if !status.success() {
            debug!(program = %self.program, exit_code = status.code(), "Credential helper refused");
            return Err(AuthError::denied(match status.code() {
                Some(code) => format!("credential helper exited with status {code}"),
                None => "credential helper was terminated by a signal".to_string(),
            }));
        }

        // Output only feeds the expiry hint. A helper that exits while a
        // child of its own still holds the pipe gets no hint.
        let stdout = output
            .and_then(|rx| rx.recv_timeout(OUTPUT_GRACE).ok())
            .unwrap_or_default();
        let expiry = parse_expiry(&String::from_utf8_lossy(&stdout), Utc::now());
        debug!(program = %self.program, has_expiry = expiry.expires_at.is_some(), "Credential helper succeeded");
        Ok(expiry)
    }
}

/// Read the pipe to EOF on its own thread, keeping at most
/// [`MAX_OUTPUT_BYTES`]
fn drain(mut pipe: ChildStdout) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut kept = Vec::new();
        let _ = pipe.by_ref().take(MAX_OUTPUT_BYTES).read_to_end(&mut kept);
        let _ = io::copy(&mut pipe, &mut io::sink());
        let _ = tx.send(kept);
    });
    rx
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[async_trait]
impl CredentialHelper for ProcessCredentialHelper {
    async fn check_or_refresh(&self) -> Result<SessionExpiry, AuthError> {
        let helper = self.clone();
        tokio::task::spawn_blocking(move || helper.run()).await.map_err(|err| {
            if err.is_cancelled() {
                AuthError::Cancelled
            } else {
                AuthError::unavailable("credential helper task panicked")
            }
        })?
    }
}

/// First recognizable expiry hint in the helper's output
fn parse_expiry(output: &str, now: DateTime<Utc>) -> SessionExpiry {
    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(seconds) = line.strip_prefix("expires_in=") {
            if let Ok(seconds) = seconds.trim().parse::<u32>() {
                return SessionExpiry::at(now + chrono::Duration::seconds(i64::from(seconds)));
            }
        } else if let Ok(at) = DateTime::parse_from_rfc3339(line) {
            return SessionExpiry::at(at.with_timezone(&Utc));
        }
    }
    SessionExpiry::unspecified()
}

/// Program names are fine to log; arguments may hold account names
impl std::fmt::Display for ProcessCredentialHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (+{} args)", self.program, self.args.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn shell(script: &str, timeout: Duration) -> ProcessCredentialHelper {
        ProcessCredentialHelper::new("sh", timeout).args(["-c".to_string(), script.to_string()])
    }

    #[test]
    fn parses_relative_and_absolute_hints() {
        assert_eq!(
            parse_expiry("logged in\nexpires_in=90\n", now()).expires_at,
            Some(now() + chrono::Duration::seconds(90))
        );
        assert_eq!(
            parse_expiry("2024-04-01T13:30:00+01:00", now()).expires_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 1, 12, 30, 0).single().expect("valid timestamp"))
        );
        assert_eq!(parse_expiry("ok", now()), SessionExpiry::unspecified());
        assert_eq!(parse_expiry("expires_in=soon", now()), SessionExpiry::unspecified());
    }

    #[test]
    fn from_settings_requires_a_command() {
        let settings = AuthSettings::default();
        assert!(matches!(
            ProcessCredentialHelper::from_settings(&settings),
            Err(TixLensError::Config(_))
        ));

        let settings = AuthSettings {
            helper_command: vec!["vendor-login".to_string(), "--quiet".to_string()],
            helper_timeout_ms: 2_500,
            ..AuthSettings::default()
        };
        let helper = ProcessCredentialHelper::from_settings(&settings).expect("helper");
        assert_eq!(helper.timeout(), Duration::from_millis(2_500));
        assert_eq!(helper.to_string(), "vendor-login (+1 args)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_reports_expiry_hint() {
        let helper = shell("echo expires_in=600", Duration::from_secs(5));

        let expiry = helper.check_or_refresh().await.expect("valid credential");

        let remaining = expiry.expires_at.expect("expiry") - Utc::now();
        assert!(remaining > chrono::Duration::seconds(590));
        assert!(remaining <= chrono::Duration::seconds(600));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_output_does_not_stall_helper() {
        let helper = shell(
            r#"head -c 200000 /dev/zero | tr "\0" a; echo; echo expires_in=60"#,
            Duration::from_secs(5),
        );
        let started = std::time::Instant::now();

        let expiry = helper.check_or_refresh().await.expect("valid credential");

        assert!(started.elapsed() < Duration::from_secs(4));
        let remaining = expiry.expires_at.expect("expiry") - Utc::now();
        assert!(remaining > chrono::Duration::seconds(50));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_denied() {
        let helper = shell("echo 'secret-token' >&2; exit 3", Duration::from_secs(5));

        let err = helper.check_or_refresh().await.expect_err("denied");

        assert!(matches!(&err, AuthError::Denied { reason } if reason.contains('3')));
        assert!(!err.to_string().contains("secret-token"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_helper_is_killed() {
        let helper = shell("sleep 5", Duration::from_millis(100));
        let started = std::time::Instant::now();

        let err = helper.check_or_refresh().await.expect_err("timeout");

        assert_eq!(err, AuthError::Timeout { waited: Duration::from_millis(100) });
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn environment_is_cleared_except_allow_list() {
        let helper = shell(
            r#"[ "$TIXLENS_HELPER_PROFILE" = ops ] && [ -z "$CARGO_MANIFEST_DIR" ]"#,
            Duration::from_secs(5),
        )
        .env("TIXLENS_HELPER_PROFILE", "ops");

        assert_eq!(helper.check_or_refresh().await, Ok(SessionExpiry::unspecified()));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let helper = ProcessCredentialHelper::new("tixlens-no-such-helper", Duration::from_secs(1));

        let err = helper.check_or_refresh().await.expect_err("unavailable");

        assert!(matches!(err, AuthError::Unavailable { .. }));
    }
}
