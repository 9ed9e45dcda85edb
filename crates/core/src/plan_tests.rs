// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    simple = { "05-01", Some(PlanId::new(5, 1)) },
    high = { "12-34", Some(PlanId::new(12, 34)) },
    one_digit_phase = { "5-01", None },
    three_digit_phase = { "005-01", None },
    one_digit_plan = { "05-1", None },
    missing_dash = { "0501", None },
    garbage = { "xx-yy", None },
)]
fn plan_id_parse(input: &str, expected: Option<PlanId>) {
    assert_eq!(PlanId::parse(input), expected);
}

#[test]
fn plan_id_display_pads_two_digits() {
    assert_eq!(PlanId::new(5, 3).to_string(), "05-03");
    assert_eq!(PlanId::new(12, 1).to_string(), "12-01");
}

#[test]
fn plan_id_orders_lexicographically() {
    assert!(PlanId::new(5, 3) < PlanId::new(6, 1));
    assert!(PlanId::new(5, 1) < PlanId::new(5, 2));
    assert!(PlanId::new(4, 9) < PlanId::new(5, 1));
}

#[test]
fn plan_id_display_parse_roundtrip() {
    let id = PlanId::new(7, 2);
    assert_eq!(PlanId::parse(&id.to_string()), Some(id));
}

#[parameterized(
    planned = { PlanStatus::Planned, "planned" },
    executing = { PlanStatus::Executing, "executing" },
    executed = { PlanStatus::Executed, "executed" },
    verified = { PlanStatus::Verified, "verified" },
)]
fn plan_status_string_roundtrip(status: PlanStatus, s: &str) {
    assert_eq!(status.as_str(), s);
    assert_eq!(PlanStatus::parse(s), Some(status));
}

#[test]
fn plan_status_orders_by_progress() {
    assert!(PlanStatus::Planned < PlanStatus::Executing);
    assert!(PlanStatus::Executing < PlanStatus::Executed);
    assert!(PlanStatus::Executed < PlanStatus::Verified);
}

#[test]
fn max_execute_phase_tracks_verify_gate() {
    let mut state = OrchestrationState::default();
    assert_eq!(state.max_execute_phase(), None);
    state.pending_verify_phase = Some(3);
    assert_eq!(state.max_execute_phase(), Some(4));
}

#[test]
fn orchestration_state_serde_defaults() {
    let state: OrchestrationState = serde_json::from_str("{}").unwrap();
    assert_eq!(state, OrchestrationState::default());
    let json = serde_json::to_string(&state).unwrap();
    assert!(!json.contains("pending_verify_phase"));
}
