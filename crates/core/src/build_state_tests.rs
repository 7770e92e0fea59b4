// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    queued    = { BuildState::Queued, false },
    preparing = { BuildState::Preparing, false },
    prepared  = { BuildState::Prepared, false },
    building  = { BuildState::Building, false },
    marked    = { BuildState::MarkedForCompletion, false },
    finished  = { BuildState::Finished, true },
    canceled  = { BuildState::Canceled, true },
    errored   = { BuildState::Errored, true },
)]
fn terminal_states(state: BuildState, expected: bool) {
    assert_eq!(state.is_terminal(), expected);
}

#[test]
fn forward_path_is_legal() {
    let path = [
        BuildState::Queued,
        BuildState::Preparing,
        BuildState::Prepared,
        BuildState::Building,
        BuildState::MarkedForCompletion,
        BuildState::Finished,
    ];
    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{} -> {} should be legal",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn skipping_states_is_illegal() {
    assert!(!BuildState::Queued.can_transition_to(BuildState::Building));
    assert!(!BuildState::Prepared.can_transition_to(BuildState::MarkedForCompletion));
    assert!(!BuildState::Building.can_transition_to(BuildState::Finished));
}

#[test]
fn any_active_state_may_cancel_or_error() {
    for state in [
        BuildState::Queued,
        BuildState::Preparing,
        BuildState::Prepared,
        BuildState::Building,
        BuildState::MarkedForCompletion,
    ] {
        assert!(state.can_transition_to(BuildState::Canceled));
        assert!(state.can_transition_to(BuildState::Errored));
    }
}

#[test]
fn terminal_states_are_frozen() {
    for state in [
        BuildState::Finished,
        BuildState::Canceled,
        BuildState::Errored,
    ] {
        for next in [
            BuildState::Queued,
            BuildState::Building,
            BuildState::Canceled,
            BuildState::Errored,
        ] {
            assert!(!state.can_transition_to(next), "{} must be frozen", state);
        }
    }
}

#[test]
fn display_matches_wire_form() {
    assert_eq!(BuildState::MarkedForCompletion.to_string(), "MARKED_FOR_COMPLETION");
    assert_eq!(BuildState::Queued.to_string(), "QUEUED");
}
