// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the flashing state machine.

use stockback_common::flow::{FlashState, Step};
use stockback_common::is_disconnect;

const ALL_STATES: [FlashState; 7] = [
    FlashState::NotConnected,
    FlashState::Connected,
    FlashState::Verified,
    FlashState::Uploaded,
    FlashState::Flashing,
    FlashState::Disconnected,
    FlashState::Failed,
];

/// Forward steps in the only order they are accepted.
const FLASH_STEPS: [Step; 5] = [
    Step::Connect,
    Step::Verify,
    Step::Upload,
    Step::Write,
    Step::Finish,
];

// =============================================================================
// Forward path
// =============================================================================

#[test]
fn test_full_forward_path() {
    let mut state = FlashState::NotConnected;
    for step in FLASH_STEPS {
        state = state.next(step).unwrap();
    }
    assert_eq!(state, FlashState::Disconnected);
}

#[test]
fn test_each_forward_step() {
    assert_eq!(
        FlashState::NotConnected.next(Step::Connect),
        Some(FlashState::Connected)
    );
    assert_eq!(
        FlashState::Connected.next(Step::Verify),
        Some(FlashState::Verified)
    );
    assert_eq!(
        FlashState::Verified.next(Step::Upload),
        Some(FlashState::Uploaded)
    );
    assert_eq!(
        FlashState::Uploaded.next(Step::Write),
        Some(FlashState::Flashing)
    );
    assert_eq!(
        FlashState::Flashing.next(Step::Finish),
        Some(FlashState::Disconnected)
    );
}

// =============================================================================
// Rejected transitions
// =============================================================================

#[test]
fn test_cannot_skip_verify() {
    assert_eq!(FlashState::Connected.next(Step::Upload), None);
}

#[test]
fn test_cannot_write_before_upload() {
    assert_eq!(FlashState::Verified.next(Step::Write), None);
    assert_eq!(FlashState::NotConnected.next(Step::Write), None);
}

#[test]
fn test_cannot_repeat_step() {
    assert_eq!(FlashState::Connected.next(Step::Connect), None);
    assert_eq!(FlashState::Uploaded.next(Step::Upload), None);
}

#[test]
fn test_exactly_one_forward_step_per_state() {
    for state in ALL_STATES {
        let accepted = FLASH_STEPS
            .iter()
            .filter(|step| state.next(**step).is_some())
            .count();
        let expected = if state.is_terminal() { 0 } else { 1 };
        assert_eq!(accepted, expected, "state {:?}", state);
    }
}

// =============================================================================
// Failure and terminal states
// =============================================================================

#[test]
fn test_fail_from_any_live_state() {
    for state in ALL_STATES.iter().filter(|s| !s.is_terminal()) {
        assert_eq!(state.next(Step::Fail), Some(FlashState::Failed));
    }
}

#[test]
fn test_terminal_states_accept_nothing() {
    for state in [FlashState::Disconnected, FlashState::Failed] {
        assert!(state.is_terminal());
        for step in FLASH_STEPS.iter().chain(&[Step::Fail]) {
            assert_eq!(state.next(*step), None);
        }
    }
}

// =============================================================================
// Disconnect classification
// =============================================================================

#[test]
fn test_is_disconnect_markers() {
    assert!(is_disconnect("connection closed: socket disconnect"));
    assert!(is_disconnect("Connection reset by peer (os error 104)"));
    assert!(is_disconnect("Broken pipe (os error 32)"));
    assert!(is_disconnect("Channel CLOSED"));
    assert!(is_disconnect("unexpected EOF"));
}

#[test]
fn test_is_disconnect_rejects_other_errors() {
    assert!(!is_disconnect("Could not open mtd device: OS1"));
    assert!(!is_disconnect("interrupted by operator"));
    assert!(!is_disconnect("permission denied"));
}
