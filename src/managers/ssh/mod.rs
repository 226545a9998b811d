mod transport;

pub use transport::{RawOutput, RemoteTransport, SshTransport, TransportError};

use crate::constants::cli::{ENTRY_POINT, NO_OUTPUT};
use crate::constants::limits::{RESPONSE_PREVIEW_BYTES, RESULT_PREVIEW_BYTES};
use crate::services::logger::Logger;
use crate::services::registry::{ConnectionProfile, InvocationMode};
use crate::utils::redact::redact_text;
use crate::utils::text::preview;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the transport should run once the session is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecMode {
    /// A single remote command line; success follows its exit status.
    Direct { command: String },
    /// `entry` is started and `script` is fed to its stdin, then EOF.
    Scripted { entry: String, script: String },
}

impl ExecMode {
    fn label(&self) -> &'static str {
        match self {
            ExecMode::Direct { .. } => "direct",
            ExecMode::Scripted { .. } => "scripted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
}

impl ExecutionResult {
    fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Escapes `value` for placement inside a single-quoted POSIX shell word.
pub fn escape_single_quoted(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Builds the remote command line for `command` under the profile's mode.
pub fn wrap_cli_command(command: &str, mode: InvocationMode) -> String {
    match mode {
        InvocationMode::Quoted => format!("{} '{}'", ENTRY_POINT, escape_single_quoted(command)),
        InvocationMode::Plain => format!("{} {}", ENTRY_POINT, command),
    }
}

/// stdout first, then stderr on its own line; blank collapses to the
/// no-output marker.
pub fn compose_output(stdout: &str, stderr: &str) -> String {
    let combined = if stderr.trim().is_empty() {
        stdout.to_string()
    } else if stdout.trim().is_empty() {
        stderr.to_string()
    } else {
        format!("{}\n{}", stdout, stderr)
    };
    let trimmed = combined.trim();
    if trimmed.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Runs device CLI work over a fresh session per call and folds every
/// failure into an [`ExecutionResult`].
#[derive(Clone)]
pub struct RemoteBridge {
    logger: Logger,
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteBridge {
    pub fn new(logger: Logger, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            logger: logger.child("ssh"),
            transport,
        }
    }

    pub async fn run_command(
        &self,
        command: &str,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> ExecutionResult {
        let command = command.trim();
        if command.is_empty() {
            return ExecutionResult::failure("command must be non-empty.");
        }
        let mode = ExecMode::Direct {
            command: wrap_cli_command(command, profile.invocation_mode),
        };
        self.execute(mode, command, profile, timeout).await
    }

    /// Starts `entry` and feeds it `script` on stdin. The script must end the
    /// session itself.
    pub async fn run_scripted(
        &self,
        entry: &str,
        script: &str,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> ExecutionResult {
        let entry = entry.trim();
        if entry.is_empty() {
            return ExecutionResult::failure("entry command must be non-empty.");
        }
        if script.trim().is_empty() {
            return ExecutionResult::failure("script must be non-empty.");
        }
        let mode = ExecMode::Scripted {
            entry: entry.to_string(),
            script: script.to_string(),
        };
        let request = format!("{} <script:{} lines>", entry, script.lines().count());
        self.execute(mode, &request, profile, timeout).await
    }

    async fn execute(
        &self,
        mode: ExecMode,
        request: &str,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> ExecutionResult {
        let addr = format!("{}:{}", profile.host, profile.port);
        self.logger.info(
            "CLI SSH REQUEST",
            Some(&json!({
                "mode": mode.label(),
                "request": redact_text(&preview(request, RESPONSE_PREVIEW_BYTES), RESPONSE_PREVIEW_BYTES),
                "invocation_mode": profile.invocation_mode,
                "addr": addr,
                "user": profile.username,
                "auth": profile.auth_method(),
                "timeout_sec": timeout.as_secs(),
            })),
        );

        let started = Instant::now();
        let transport = self.transport.clone();
        let owned_profile = profile.clone();
        let owned_mode = mode.clone();
        let joined = tokio::task::spawn_blocking(move || {
            transport.execute(&owned_profile, &owned_mode, timeout)
        })
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let raw = match joined {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                self.logger.error(
                    "CLI SSH EXCEPTION",
                    Some(&json!({
                        "addr": addr,
                        "phase": err.phase(),
                        "error": err.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
                return ExecutionResult::failure(err.to_string());
            }
            Err(join_err) => {
                self.logger.error(
                    "CLI SSH EXCEPTION",
                    Some(&json!({
                        "addr": addr,
                        "phase": "executing",
                        "error": join_err.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
                return ExecutionResult::failure(format!("SSH worker failed: {}", join_err));
            }
        };

        let success = match mode {
            ExecMode::Direct { .. } => raw.exit_status == Some(0),
            // configuration sessions report through their output, not the exit code
            ExecMode::Scripted { .. } => true,
        };
        let output = compose_output(&raw.stdout, &raw.stderr);
        self.logger.info(
            "CLI SSH RESPONSE",
            Some(&json!({
                "addr": addr,
                "exit_status": raw.exit_status,
                "success": success,
                "duration_ms": duration_ms,
                "stdout_len": raw.stdout.len(),
                "stderr_len": raw.stderr.len(),
                "output_preview": preview(&output, RESULT_PREVIEW_BYTES),
            })),
        );
        ExecutionResult { success, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        calls: Mutex<Vec<ExecMode>>,
        reply: Result<RawOutput, TransportError>,
    }

    impl RemoteTransport for Recorder {
        fn execute(
            &self,
            _profile: &ConnectionProfile,
            mode: &ExecMode,
            _timeout: Duration,
        ) -> Result<RawOutput, TransportError> {
            self.calls.lock().unwrap().push(mode.clone());
            self.reply.clone()
        }
    }

    fn bridge(reply: Result<RawOutput, TransportError>) -> (RemoteBridge, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            reply,
        });
        (RemoteBridge::new(Logger::new("test"), recorder.clone()), recorder)
    }

    fn raw(stdout: &str, stderr: &str, exit_status: i32) -> RawOutput {
        RawOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status: Some(exit_status),
        }
    }

    #[test]
    fn quoted_wrapping_survives_shell_split() {
        let command = "show interfaces | match \"it's up\"";
        let wrapped = wrap_cli_command(command, InvocationMode::Quoted);
        let words = shlex::split(&wrapped).unwrap();
        assert_eq!(words, vec!["cli".to_string(), command.to_string()]);
        assert_eq!(
            wrap_cli_command("show version", InvocationMode::Plain),
            "cli show version"
        );
    }

    #[test]
    fn compose_output_merges_and_marks_blank() {
        assert_eq!(compose_output("  out \n", ""), "out");
        assert_eq!(compose_output("", "err\n"), "err");
        assert_eq!(compose_output("out", "err"), "out\nerr");
        assert_eq!(compose_output(" ", "\n"), NO_OUTPUT);
    }

    #[tokio::test]
    async fn direct_success_follows_exit_status() {
        let profile = ConnectionProfile::new("10.0.0.1");
        let (ok, recorder) = bridge(Ok(raw("Junos: 23.4R1\n", "", 0)));
        let result = ok.run_command(" show version ", &profile, Duration::from_secs(5)).await;
        assert!(result.success);
        assert_eq!(result.output, "Junos: 23.4R1");
        assert_eq!(
            recorder.calls.lock().unwrap()[0],
            ExecMode::Direct {
                command: "cli show version".to_string()
            }
        );

        let (failing, _) = bridge(Ok(raw("", "syntax error\n", 1)));
        let result = failing.run_command("show nonsense", &profile, Duration::from_secs(5)).await;
        assert!(!result.success);
        assert_eq!(result.output, "syntax error");
    }

    #[tokio::test]
    async fn scripted_success_ignores_exit_status() {
        let profile = ConnectionProfile::new("10.0.0.1");
        let (bridge, recorder) = bridge(Ok(raw("commit complete\n", "", 1)));
        let script = "configure private\nrollback 0\ncommit\nexit\n";
        let result = bridge.run_scripted("cli", script, &profile, Duration::from_secs(5)).await;
        assert!(result.success);
        assert_eq!(result.output, "commit complete");
        assert_eq!(
            recorder.calls.lock().unwrap()[0],
            ExecMode::Scripted {
                entry: "cli".to_string(),
                script: script.to_string()
            }
        );
    }

    #[tokio::test]
    async fn scripted_entry_is_caller_chosen() {
        let profile = ConnectionProfile::new("10.0.0.1");
        let (bridge, recorder) = bridge(Ok(raw("ok", "", 0)));
        bridge
            .run_scripted(" cli -c ", "show version\nexit\n", &profile, Duration::from_secs(5))
            .await;
        assert_eq!(
            recorder.calls.lock().unwrap()[0],
            ExecMode::Scripted {
                entry: "cli -c".to_string(),
                script: "show version\nexit\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn transport_errors_become_failed_results() {
        let profile = ConnectionProfile::new("10.0.0.1");
        let (bridge, _) = bridge(Err(TransportError::Connect {
            addr: "10.0.0.1:22".to_string(),
            message: "connection refused".to_string(),
        }));
        let result = bridge.run_command("show version", &profile, Duration::from_secs(5)).await;
        assert!(!result.success);
        assert!(result.output.contains("connection refused"));
    }

    #[tokio::test]
    async fn blank_input_never_reaches_transport() {
        let profile = ConnectionProfile::new("10.0.0.1");
        let (bridge, recorder) = bridge(Ok(raw("x", "", 0)));
        assert!(!bridge.run_command("   ", &profile, Duration::from_secs(5)).await.success);
        assert!(!bridge.run_scripted("cli", "\n", &profile, Duration::from_secs(5)).await.success);
        assert!(!bridge.run_scripted(" ", "exit\n", &profile, Duration::from_secs(5)).await.success);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}
