// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Session parameters for a recovery run.

use std::time::Duration;

use crate::protocol::{
    DEFAULT_HOST, DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USERNAME, REMOTE_FIRMWARE_PATH,
};

/// Default timeout for connecting and authenticating, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Where and how to reach the router. Fixed for the duration of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    /// Staging path for the uploaded image on the router.
    pub remote_path: String,
}

impl SessionParams {
    /// `host:port` form used for socket connections and messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Password as shown to the operator.
    pub fn password_display(&self) -> &str {
        if self.password.is_empty() {
            "<empty>"
        } else {
            "<set>"
        }
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            remote_path: REMOTE_FIRMWARE_PATH.to_string(),
        }
    }
}
