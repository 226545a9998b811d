use crate::constants::network::{POLL_INTERVAL_MS, SESSION_CLOSE_GRACE_MS, TIMEOUT_CONNECT_MAX_SECS};
use crate::services::logger::Logger;
use crate::services::registry::ConnectionProfile;
use base64::Engine;
use ssh2::{Channel, Session};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::ExecMode;

/// Bytes and status collected from one remote invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Unable to connect to {addr}: {message}")]
    Connect { addr: String, message: String },
    #[error("Authentication failed for user '{username}' ({method}): {message}")]
    Auth {
        username: String,
        method: &'static str,
        message: String,
    },
    #[error("Command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("SSH error: {0}")]
    Channel(String),
}

impl TransportError {
    pub fn phase(&self) -> &'static str {
        match self {
            TransportError::Connect { .. } => "connecting",
            TransportError::Auth { .. } => "authenticating",
            TransportError::Timeout(_) | TransportError::Channel(_) => "executing",
        }
    }
}

/// One remote-shell round trip: connect, run, collect, close.
///
/// Implementations own the session for the duration of the call and must
/// release it on every return path.
pub trait RemoteTransport: Send + Sync {
    fn execute(
        &self,
        profile: &ConnectionProfile,
        mode: &ExecMode,
        timeout: Duration,
    ) -> Result<RawOutput, TransportError>;
}

#[derive(Clone)]
pub struct SshTransport {
    logger: Logger,
}

impl SshTransport {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("transport"),
        }
    }
}

impl RemoteTransport for SshTransport {
    fn execute(
        &self,
        profile: &ConnectionProfile,
        mode: &ExecMode,
        timeout: Duration,
    ) -> Result<RawOutput, TransportError> {
        let connected = connect_session(profile, timeout, &self.logger)?;
        let mut channel = connected
            .session
            .channel_session()
            .map_err(channel_error)?;
        let (command, stdin) = match mode {
            ExecMode::Direct { command } => (command.as_str(), None),
            ExecMode::Scripted { entry, script } => (entry.as_str(), Some(script.as_bytes())),
        };
        channel.exec(command).map_err(channel_error)?;
        let output = drive_channel(&connected.session, &mut channel, stdin, timeout);
        let _ = channel.close();
        output
    }
}

/// Live session; disconnects when dropped, waiting at most the close grace
/// for a hung peer.
struct ConnectedSession {
    session: Session,
}

impl Drop for ConnectedSession {
    fn drop(&mut self) {
        self.session.set_blocking(true);
        self.session.set_timeout(SESSION_CLOSE_GRACE_MS as u32);
        let _ = self.session.disconnect(None, "session closed", None);
    }
}

fn connect_session(
    profile: &ConnectionProfile,
    timeout: Duration,
    logger: &Logger,
) -> Result<ConnectedSession, TransportError> {
    let addr = format!("{}:{}", profile.host, profile.port);
    let connect_timeout = timeout.min(Duration::from_secs(TIMEOUT_CONNECT_MAX_SECS));
    let connect_error = |message: String| TransportError::Connect {
        addr: addr.clone(),
        message,
    };

    let candidates = (profile.host.as_str(), profile.port)
        .to_socket_addrs()
        .map_err(|err| connect_error(err.to_string()))?;
    let mut last_error = None;
    let mut stream = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, connect_timeout) {
            Ok(tcp) => {
                stream = Some(tcp);
                break;
            }
            Err(err) => last_error = Some(err.to_string()),
        }
    }
    let tcp = stream.ok_or_else(|| {
        connect_error(last_error.unwrap_or_else(|| "host did not resolve".to_string()))
    })?;
    tcp.set_read_timeout(Some(connect_timeout)).ok();
    tcp.set_write_timeout(Some(connect_timeout)).ok();

    let mut session = Session::new()
        .map_err(|err| connect_error(format!("failed to create SSH session: {}", err)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(connect_timeout.as_millis() as u32);
    session
        .handshake()
        .map_err(|err| connect_error(format!("handshake failed: {}", err)))?;
    let connected = ConnectedSession { session };

    if let Some(hash) = connected.session.host_key_hash(ssh2::HashType::Sha256) {
        let fingerprint = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
        logger.debug(
            "host key",
            Some(&serde_json::json!({ "addr": addr, "fingerprint": format!("SHA256:{}", fingerprint) })),
        );
    }

    let method = profile.auth_method();
    let auth_error = |message: String| TransportError::Auth {
        username: profile.username.clone(),
        method,
        message,
    };
    match profile.usable_key() {
        Some(key) => connected
            .session
            .userauth_pubkey_file(&profile.username, None, key, None)
            .map_err(|err| auth_error(err.to_string()))?,
        None => connected
            .session
            .userauth_password(&profile.username, &profile.password)
            .map_err(|err| auth_error(err.to_string()))?,
    }
    if !connected.session.authenticated() {
        return Err(auth_error("server rejected credentials".to_string()));
    }
    Ok(connected)
}

/// Writes `stdin` (then EOF) and reads both streams until the remote side
/// closes or `timeout` elapses.
fn drive_channel(
    session: &Session,
    channel: &mut Channel,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<RawOutput, TransportError> {
    session.set_blocking(false);
    let started = Instant::now();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdin_offset = 0usize;
    let mut stdin_done = stdin.is_none();
    let mut stderr_stream = channel.stderr();
    let mut buf = [0u8; 8192];

    loop {
        let mut progressed = false;

        if let (false, Some(bytes)) = (stdin_done, stdin) {
            if stdin_offset < bytes.len() {
                match channel.write(&bytes[stdin_offset..]) {
                    Ok(n) if n > 0 => {
                        stdin_offset += n;
                        progressed = true;
                    }
                    Ok(_) => {}
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(TransportError::Channel(format!("stdin write failed: {}", err))),
                }
            }
            if stdin_offset >= bytes.len() {
                match channel.send_eof() {
                    Ok(()) => stdin_done = true,
                    Err(err) if is_would_block(&err) => {}
                    Err(err) => return Err(channel_error(err)),
                }
            }
        }

        match channel.read(&mut buf) {
            Ok(n) if n > 0 => {
                stdout.extend_from_slice(&buf[..n]);
                progressed = true;
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(TransportError::Channel(format!("stdout read failed: {}", err))),
        }
        match stderr_stream.read(&mut buf) {
            Ok(n) if n > 0 => {
                stderr.extend_from_slice(&buf[..n]);
                progressed = true;
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(TransportError::Channel(format!("stderr read failed: {}", err))),
        }

        if channel.eof() && !progressed {
            break;
        }
        if started.elapsed() > timeout {
            return Err(TransportError::Timeout(timeout));
        }
        if !progressed {
            std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        }
    }

    // exit-status may trail EOF; wait for the close handshake within the budget.
    loop {
        match channel.wait_close() {
            Ok(()) => break,
            Err(err) if is_would_block(&err) => {
                if started.elapsed() > timeout {
                    break;
                }
                std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
            }
            Err(_) => break,
        }
    }

    Ok(RawOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status: channel.exit_status().ok(),
    })
}

fn is_would_block(err: &ssh2::Error) -> bool {
    matches!(err.code(), ssh2::ErrorCode::Session(code) if code == -37)
}

fn channel_error(err: ssh2::Error) -> TransportError {
    let io_err: std::io::Error = err.into();
    if io_err.kind() == ErrorKind::TimedOut {
        return TransportError::Channel("operation timed out".to_string());
    }
    TransportError::Channel(io_err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_name_their_phase() {
        let err = TransportError::Connect {
            addr: "10.0.0.1:22".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.phase(), "connecting");
        assert_eq!(err.to_string(), "Unable to connect to 10.0.0.1:22: connection refused");

        let err = TransportError::Timeout(Duration::from_secs(90));
        assert_eq!(err.phase(), "executing");
        assert_eq!(err.to_string(), "Command timed out after 90s");
    }

    #[test]
    fn silent_peer_times_out_while_connecting() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            // accept and never speak SSH
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_secs(10));
                drop(stream);
            }
        });

        let mut profile = ConnectionProfile::new("127.0.0.1");
        profile.port = port;
        let transport = SshTransport::new(Logger::new("test"));
        let started = Instant::now();
        let err = transport
            .execute(
                &profile,
                &ExecMode::Direct {
                    command: "cli show version".to_string(),
                },
                Duration::from_secs(2),
            )
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.phase(), "connecting");
        assert!(err.to_string().starts_with(&format!("Unable to connect to 127.0.0.1:{}", port)));
        assert!(elapsed >= Duration::from_millis(1_500), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "overran the budget: {:?}", elapsed);
    }

    #[test]
    fn close_grace_stays_below_the_connect_budget() {
        assert!(SESSION_CLOSE_GRACE_MS < TIMEOUT_CONNECT_MAX_SECS * 1000);
    }

    #[test]
    fn unreachable_host_reports_connect_failure() {
        let mut profile = ConnectionProfile::new("127.0.0.1");
        profile.port = 1;
        let transport = SshTransport::new(Logger::new("test"));
        let err = transport
            .execute(
                &profile,
                &ExecMode::Direct {
                    command: "cli show version".to_string(),
                },
                Duration::from_secs(2),
            )
            .unwrap_err();
        assert_eq!(err.phase(), "connecting");
    }
}
