// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Transport seam between the recovery workflow and the SSH implementation.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::config::SessionParams;

/// Failure of an operation on an open session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer or the socket went away.
    #[error("connection closed: {0}")]
    Closed(String),

    #[error("interrupted by operator")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure to establish an authenticated session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{0}")]
    Authentication(String),

    /// Unreachable host, refused connection, timeout or handshake failure.
    #[error("{0}")]
    Network(String),
}

/// An authenticated shell session on the router.
pub trait Remote {
    /// Run a command to completion and return its stdout.
    fn exec(&mut self, command: &str) -> Result<String, TransportError>;

    /// Copy `local` to `remote_path`, calling `progress(sent, total)` as bytes
    /// go out. Returns the number of bytes sent.
    fn upload(
        &mut self,
        local: &Path,
        remote_path: &str,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64, TransportError>;

    /// Run a command on a pseudo-terminal, handing output chunks to `output`
    /// as they arrive. Returns the exit status if the command finished.
    fn exec_streaming(
        &mut self,
        command: &str,
        output: &mut dyn FnMut(&[u8]),
    ) -> Result<i32, TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens sessions. Separate from [`Remote`] so a run can fail before one exists.
pub trait Connector {
    type Remote: Remote;

    fn connect(&mut self, params: &SessionParams) -> Result<Self::Remote, ConnectError>;
}

/// Owns an open session and closes it exactly once: explicitly through
/// [`SessionGuard::close`] or on drop, whichever comes first.
pub struct SessionGuard<R: Remote> {
    remote: R,
    closed: bool,
}

impl<R: Remote> SessionGuard<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            closed: false,
        }
    }

    pub fn remote(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // The router may already have dropped the link while rebooting.
        match self.remote.close() {
            Ok(()) => tracing::debug!("session closed"),
            Err(e) => tracing::debug!("error while closing session: {}", e),
        }
    }
}

impl<R: Remote> Drop for SessionGuard<R> {
    fn drop(&mut self) {
        self.close();
    }
}
