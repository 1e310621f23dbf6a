// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SSH transport layer for router communication.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use ssh2::{Channel, ErrorCode, HashType, Session};

use stockback_common::{CancelFlag, ConnectError, Connector, Remote, SessionParams, TransportError};

/// Delay between polls of the write command's output.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Seconds between SSH keepalives while waiting on the write command.
pub const KEEPALIVE_INTERVAL_SECS: u32 = 5;

/// Longest silence from the write command before the device counts as gone.
pub const MAX_WRITE_IDLE: Duration = Duration::from_secs(120);

/// SCP write size; progress is reported once per chunk.
const UPLOAD_CHUNK_SIZE: usize = 32 * 1024;

// libssh2 error codes
const LIBSSH2_ERROR_SOCKET_SEND: i32 = -7;
const LIBSSH2_ERROR_SOCKET_DISCONNECT: i32 = -13;
const LIBSSH2_ERROR_PASSWORD_EXPIRED: i32 = -15;
const LIBSSH2_ERROR_METHOD_NONE: i32 = -17;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_ERROR_CHANNEL_CLOSED: i32 = -26;
const LIBSSH2_ERROR_EAGAIN: i32 = -37;
const LIBSSH2_ERROR_SOCKET_RECV: i32 = -43;

fn session_code(e: &ssh2::Error) -> Option<i32> {
    match e.code() {
        ErrorCode::Session(code) => Some(code),
        _ => None,
    }
}

/// Whether a libssh2 error code means the socket or channel is gone.
fn is_socket_loss(code: i32) -> bool {
    matches!(
        code,
        LIBSSH2_ERROR_SOCKET_SEND
            | LIBSSH2_ERROR_SOCKET_DISCONNECT
            | LIBSSH2_ERROR_SOCKET_RECV
            | LIBSSH2_ERROR_CHANNEL_CLOSED
    )
}

/// Map an SSH error from an open session, keeping socket loss recognisable.
fn ssh_error(e: ssh2::Error) -> TransportError {
    match session_code(&e) {
        Some(code) if is_socket_loss(code) => TransportError::Closed(e.message().to_string()),
        _ => TransportError::Other(e.to_string()),
    }
}

/// Map an I/O error raised by a channel read or write.
fn io_error(e: io::Error) -> TransportError {
    let wrapped = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ssh2::Error>())
        .and_then(session_code);
    if let Some(code) = wrapped {
        return if is_socket_loss(code) {
            TransportError::Closed(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        };
    }

    match e.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => TransportError::Closed(e.to_string()),
        _ => TransportError::Io(e),
    }
}

/// Classify a failure during handshake or authentication.
fn connect_error(e: ssh2::Error) -> ConnectError {
    match session_code(&e) {
        Some(
            LIBSSH2_ERROR_AUTHENTICATION_FAILED
            | LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED
            | LIBSSH2_ERROR_PASSWORD_EXPIRED
            | LIBSSH2_ERROR_METHOD_NONE,
        ) => ConnectError::Authentication(e.message().to_string()),
        _ => ConnectError::Network(e.to_string()),
    }
}

fn fingerprint(hash: &[u8]) -> String {
    hex::encode(hash)
}

fn check_idle(idle: Duration, limit: Duration) -> Result<(), TransportError> {
    if idle >= limit {
        return Err(TransportError::Closed(format!(
            "no data from device for {}s",
            idle.as_secs()
        )));
    }
    Ok(())
}

/// Opens password (or passwordless) SSH sessions.
pub struct SshConnector {
    cancel: CancelFlag,
}

impl SshConnector {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl Connector for SshConnector {
    type Remote = SshRemote;

    fn connect(&mut self, params: &SessionParams) -> Result<SshRemote, ConnectError> {
        let address = params.address();
        let addr = address
            .to_socket_addrs()
            .map_err(|e| ConnectError::Network(format!("invalid address {}: {}", address, e)))?
            .next()
            .ok_or_else(|| ConnectError::Network(format!("{} did not resolve", address)))?;

        let tcp = TcpStream::connect_timeout(&addr, params.connect_timeout)
            .map_err(|e| ConnectError::Network(e.to_string()))?;

        let timeout_ms = u32::try_from(params.connect_timeout.as_millis()).unwrap_or(u32::MAX);
        let mut session = Session::new().map_err(connect_error)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_ms);
        session.handshake().map_err(connect_error)?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            // Recovery targets regenerate keys on every reflash; nothing to pin against.
            tracing::debug!("host key sha256 {}", fingerprint(hash));
        }

        authenticate(&session, params)?;
        session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);
        tracing::debug!("authenticated as {}", params.username);

        Ok(SshRemote {
            session,
            cancel: self.cancel.clone(),
        })
    }
}

fn authenticate(session: &Session, params: &SessionParams) -> Result<(), ConnectError> {
    // Listing methods sends a `none` auth request; passwordless root accepts it.
    let methods = session
        .auth_methods(&params.username)
        .map_err(connect_error)?;
    if session.authenticated() {
        tracing::debug!("server accepted none authentication");
        return Ok(());
    }
    tracing::debug!("server offers authentication methods: {}", methods);

    session
        .userauth_password(&params.username, &params.password)
        .map_err(connect_error)?;

    if session.authenticated() {
        Ok(())
    } else {
        Err(ConnectError::Authentication(
            "server did not accept the credentials".to_string(),
        ))
    }
}

/// An authenticated SSH session on the router.
pub struct SshRemote {
    session: Session,
    cancel: CancelFlag,
}

impl SshRemote {
    /// Copy available output to `output` until the command finishes.
    fn pump(&self, channel: &mut Channel, output: &mut dyn FnMut(&[u8])) -> Result<(), TransportError> {
        let mut buf = [0u8; 1024];
        let mut last_output = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return Err(TransportError::Interrupted);
            }

            match channel.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    output(&buf[..n]);
                    last_output = Instant::now();
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(io_error(e)),
            }

            if channel.eof() {
                return Ok(());
            }

            // Surfaces a vanished peer as a socket error instead of polling forever.
            match self.session.keepalive_send() {
                Ok(_) => {}
                Err(e) if session_code(&e) == Some(LIBSSH2_ERROR_EAGAIN) => {}
                Err(e) => return Err(ssh_error(e)),
            }
            check_idle(last_output.elapsed(), MAX_WRITE_IDLE)?;

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Remote for SshRemote {
    fn exec(&mut self, command: &str) -> Result<String, TransportError> {
        tracing::debug!("exec `{}`", command);
        let mut channel = self.session.channel_session().map_err(ssh_error)?;
        channel.exec(command).map_err(ssh_error)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout).map_err(io_error)?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(io_error)?;

        channel.wait_close().map_err(ssh_error)?;
        let status = channel.exit_status().map_err(ssh_error)?;
        if status != 0 {
            return Err(TransportError::Other(format!(
                "`{}` exited with status {}: {}",
                command,
                status,
                stderr.trim()
            )));
        }

        Ok(stdout)
    }

    fn upload(
        &mut self,
        local: &Path,
        remote_path: &str,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64, TransportError> {
        let mut file = File::open(local)?;
        let total = file.metadata()?.len();

        let mut channel = self
            .session
            .scp_send(Path::new(remote_path), 0o644, total, None)
            .map_err(ssh_error)?;

        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut sent = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransportError::Interrupted);
            }

            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            channel.write_all(&buf[..n]).map_err(io_error)?;
            sent += n as u64;
            progress(sent, total);
        }

        channel.send_eof().map_err(ssh_error)?;
        channel.wait_eof().map_err(ssh_error)?;
        channel.close().map_err(ssh_error)?;
        channel.wait_close().map_err(ssh_error)?;

        tracing::debug!("scp sent {} of {} bytes to {}", sent, total, remote_path);
        Ok(sent)
    }

    fn exec_streaming(
        &mut self,
        command: &str,
        output: &mut dyn FnMut(&[u8]),
    ) -> Result<i32, TransportError> {
        tracing::debug!("exec with pty `{}`", command);
        let mut channel = self.session.channel_session().map_err(ssh_error)?;
        channel
            .request_pty("vt100", None, None)
            .map_err(ssh_error)?;
        channel.exec(command).map_err(ssh_error)?;

        self.session.set_blocking(false);
        let pumped = self.pump(&mut channel, output);
        self.session.set_blocking(true);
        pumped?;

        channel.wait_close().map_err(ssh_error)?;
        channel.exit_status().map_err(ssh_error)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.session.set_blocking(true);
        self.session
            .disconnect(None, "recovery finished", None)
            .map_err(ssh_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockback_common::is_disconnect;

    #[test]
    fn test_socket_errors_are_disconnects() {
        for code in [
            LIBSSH2_ERROR_SOCKET_SEND,
            LIBSSH2_ERROR_SOCKET_DISCONNECT,
            LIBSSH2_ERROR_SOCKET_RECV,
            LIBSSH2_ERROR_CHANNEL_CLOSED,
        ] {
            let err = ssh_error(ssh2::Error::new(ErrorCode::Session(code), "socket gone"));
            assert!(matches!(err, TransportError::Closed(_)));
            assert!(is_disconnect(&err.to_string()), "code {}", code);
        }
    }

    #[test]
    fn test_other_ssh_errors_are_not_disconnects() {
        let err = ssh_error(ssh2::Error::new(
            ErrorCode::Session(-22),
            "Channel request denied",
        ));
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[test]
    fn test_io_reset_is_closed() {
        let err = io_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(err, TransportError::Closed(_)));

        let err = io_error(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(err, TransportError::Closed(_)));
    }

    #[test]
    fn test_io_other_is_kept() {
        let err = io_error(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_wrapped_ssh_error_in_io_error() {
        let inner = ssh2::Error::new(
            ErrorCode::Session(LIBSSH2_ERROR_SOCKET_RECV),
            "Failure while draining incoming flow",
        );
        let err = io_error(io::Error::new(io::ErrorKind::Other, inner));
        assert!(matches!(err, TransportError::Closed(_)));
        assert!(err.to_string().contains("draining incoming flow"));
    }

    #[test]
    fn test_auth_errors_classified() {
        let auth = connect_error(ssh2::Error::new(
            ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED),
            "Authentication failed (username/password)",
        ));
        assert!(matches!(auth, ConnectError::Authentication(_)));

        let net = connect_error(ssh2::Error::new(
            ErrorCode::Session(-9),
            "Timed out waiting on socket",
        ));
        assert!(matches!(net, ConnectError::Network(_)));
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(fingerprint(&[0x0a, 0xff, 0x10]), "0aff10");
        assert_eq!(fingerprint(&[0u8; 32]).len(), 64);
    }

    #[test]
    fn test_silent_device_counts_as_disconnect() {
        assert!(check_idle(Duration::from_secs(5), MAX_WRITE_IDLE).is_ok());

        let err = check_idle(MAX_WRITE_IDLE + POLL_INTERVAL, MAX_WRITE_IDLE).unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
        assert!(is_disconnect(&err.to_string()));
    }
}
