// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flashing state machine - pure logic without transport dependencies.
//!
//! A run moves strictly forward:
//! `NotConnected -> Connected -> Verified -> Uploaded -> Flashing -> Disconnected`.
//! Any state except the terminal ones may move to `Failed`. Nothing can be
//! skipped, repeated or reordered.

/// Where a recovery run currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashState {
    NotConnected,
    Connected,
    Verified,
    Uploaded,
    Flashing,
    /// The write command ran and the session ended. Terminal, success.
    Disconnected,
    /// Terminal, failure.
    Failed,
}

/// Transition inputs, one per orchestrator step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Connect,
    Verify,
    Upload,
    Write,
    /// The session ended after the write command was issued.
    Finish,
    Fail,
}

impl FlashState {
    /// Apply `step`, returning the new state or `None` if it is not allowed here.
    pub fn next(self, step: Step) -> Option<FlashState> {
        use FlashState::*;

        match (self, step) {
            (NotConnected, Step::Connect) => Some(Connected),
            (Connected, Step::Verify) => Some(Verified),
            (Verified, Step::Upload) => Some(Uploaded),
            (Uploaded, Step::Write) => Some(Flashing),
            (Flashing, Step::Finish) => Some(Disconnected),
            (state, Step::Fail) if !state.is_terminal() => Some(Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlashState::Disconnected | FlashState::Failed)
    }
}
