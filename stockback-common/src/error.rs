// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy for a recovery run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::flow::{FlashState, Step};

/// Substrings that mark a transport error as the peer going away.
const DISCONNECT_MARKERS: [&str; 6] = [
    "closed",
    "connection",
    "disconnect",
    "reset by peer",
    "broken pipe",
    "unexpected eof",
];

/// Why a run ended without flashing the device.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no firmware image (*.bin) found in {}", .dir.display())]
    FirmwareNotFound { dir: PathBuf },

    #[error("firmware image {} is empty", .path.display())]
    FirmwareEmpty { path: PathBuf },

    #[error("cannot read firmware image {}: {source}", .path.display())]
    FirmwareUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("authentication failed for {username}@{host}: {reason}")]
    AuthenticationFailed {
        username: String,
        host: String,
        reason: String,
    },

    #[error("cannot connect to {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("cannot read the partition table: {reason}")]
    VerifyFailed { reason: String },

    #[error("no {} partition on the device", .expected.join("/"))]
    PartitionNotFound { expected: Vec<String>, table: String },

    #[error("firmware is {size} bytes but partition {partition} holds only {capacity}")]
    FirmwareTooLarge {
        size: u64,
        partition: String,
        capacity: u64,
    },

    #[error("upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("flash write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("cancelled by user")]
    UserCancelled,

    #[error("interrupted by user")]
    Interrupted,

    #[error("cannot {step:?} from state {from:?}")]
    InvalidTransition { from: FlashState, step: Step },
}

impl RecoveryError {
    /// Process exit status for this outcome. Declining to flash is not a failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UserCancelled => 0,
            _ => 1,
        }
    }
}

/// Whether an error message describes the remote side dropping the session.
pub fn is_disconnect(message: &str) -> bool {
    let message = message.to_lowercase();
    DISCONNECT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
