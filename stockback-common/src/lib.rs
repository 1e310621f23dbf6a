// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and logic for stockback.
//!
//! Everything here is independent of the SSH library so the recovery
//! workflow can be exercised against mock remotes:
//! - `protocol`: remote paths, commands and `/proc/mtd` parsing
//! - `firmware`: locating and identifying the local image
//! - `flow`: the flashing state machine
//! - `remote`: the transport seam implemented by the host tool
//! - `orchestrator`: the step-by-step recovery run

pub mod cancel;
pub mod config;
pub mod error;
pub mod firmware;
pub mod flow;
pub mod orchestrator;
pub mod protocol;
pub mod remote;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use config::SessionParams;
pub use error::{is_disconnect, RecoveryError};
pub use firmware::{Firmware, Selection};
pub use flow::{FlashState, Step};
pub use orchestrator::{FlashReport, Observer, Orchestrator, WriteOutcome};
pub use protocol::MtdPartition;
pub use remote::{ConnectError, Connector, Remote, SessionGuard, TransportError};
