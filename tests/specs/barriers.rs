//! Admission barriers: execute concurrency, the verify gate, and the
//! plan-ahead window.

use crate::prelude::*;
use corral_daemon::protocol::{Body, ErrorCode, Request};

#[tokio::test]
async fn only_one_execute_may_run() {
    let spec = spec();

    spec.start("sleep 60 # execute-plan specs/app/planning/plans/02-01-PLAN.md")
        .await;
    let reply = spec
        .request(Request::StartSession {
            working_dir: spec.project(),
            command: Some("sleep 60 # execute-plan specs/app/planning/plans/02-02-PLAN.md".into()),
        })
        .await;
    assert_eq!(reply.code, Some(ErrorCode::ExecutionLimit));
    // The rejection names the offending slot and command
    let error = reply.error.unwrap_or_default();
    assert!(error.contains("slot"), "error: {error}");
    assert!(error.contains("02-01-PLAN.md"), "error: {error}");
}

#[tokio::test]
async fn verify_gate_bounds_execute_phase() {
    let spec = spec();
    let root = spec.project();

    // Phase 3 executed, never verified
    seed_plan(&root, 3, 1, true);
    spec.request(Request::SyncProjectState {
        project_root: root.clone(),
    })
    .await;

    // Phase 4 = pending + 1 is admitted
    let reply = spec
        .request(Request::StartSession {
            working_dir: root.clone(),
            command: Some("sleep 60 # execute-plan specs/app/planning/plans/04-01-PLAN.md".into()),
        })
        .await;
    assert!(reply.success, "phase 4 should pass: {:?}", reply.error);

    // End it so the concurrency barrier does not mask the verify gate
    if let Some(Body::Session { session }) = reply.body {
        let id = session.id.to_string();
        spec.request(Request::EndSession { id: id.clone() }).await;
        spec.wait_until_ended(&id).await;
    }

    // Phase 5 is past the gate
    let reply = spec
        .request(Request::StartSession {
            working_dir: root.clone(),
            command: Some("sleep 60 # execute-plan specs/app/planning/plans/05-01-PLAN.md".into()),
        })
        .await;
    assert_eq!(reply.code, Some(ErrorCode::VerifyGate));
    let error = reply.error.unwrap_or_default();
    assert!(error.contains('3'), "error should name the pending phase: {error}");

    // Verification clears the gate
    spec.request(Request::MarkPhaseVerified {
        project_root: root.clone(),
        phase: 3,
    })
    .await;
    let reply = spec
        .request(Request::StartSession {
            working_dir: root.clone(),
            command: Some("sleep 60 # execute-plan specs/app/planning/plans/05-01-PLAN.md".into()),
        })
        .await;
    assert!(reply.success, "gate should be clear: {:?}", reply.error);
}

#[tokio::test]
async fn plan_ahead_window_is_two_plans() {
    let spec = spec();
    let root = spec.project();

    spec.request(Request::SetExecutionState {
        project_root: root.clone(),
        highest_executed_phase: 4,
        highest_executing_phase: Some(5),
        highest_executing_plan: Some(1),
        force_reset: false,
    })
    .await;

    // Planning within the window is admitted
    let reply = spec
        .request(Request::StartSession {
            working_dir: root.clone(),
            command: Some("plan-phase 5".into()),
        })
        .await;
    assert!(reply.success, "phase 5 should pass: {:?}", reply.error);
    if let Some(Body::Session { session }) = reply.body {
        let id = session.id.to_string();
        spec.wait_until_ended(&id).await;
    }

    // Two plan-units ahead is the limit
    let reply = spec
        .request(Request::StartSession {
            working_dir: root.clone(),
            command: Some("plan-phase 7".into()),
        })
        .await;
    assert_eq!(reply.code, Some(ErrorCode::PlanningLimit));
    assert!(
        reply.error.unwrap_or_default().contains("05-03"),
        "rejection echoes the max allowed plan"
    );
}

#[tokio::test]
async fn force_reset_clears_project_state() {
    let spec = spec();
    let root = spec.project();
    seed_plan(&root, 1, 1, true);
    spec.request(Request::SyncProjectState {
        project_root: root.clone(),
    })
    .await;

    let reply = spec
        .request(Request::SetExecutionState {
            project_root: root.clone(),
            highest_executed_phase: 0,
            highest_executing_phase: None,
            highest_executing_plan: None,
            force_reset: true,
        })
        .await;
    match reply.body {
        Some(Body::ExecutionState { state }) => {
            assert_eq!(state, corral_core::OrchestrationState::default());
        }
        other => panic!("unexpected body: {other:?}"),
    }
    assert!(spec.daemon.store.list_plans(&root).unwrap().is_empty());
}

#[tokio::test]
async fn completed_execute_advances_the_executed_cursor() {
    let spec = spec();
    let root = spec.project();
    seed_plan(&root, 2, 1, false);
    spec.request(Request::SyncProjectState {
        project_root: root.clone(),
    })
    .await;

    let id = spec
        .start("true # execute-plan specs/app/planning/plans/02-01-PLAN.md")
        .await;
    spec.wait_until_ended(&id).await;

    // The terminal watcher marks the plan executed and raises the cursor
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let plans = spec.daemon.store.list_plans(&root).unwrap();
        if plans
            .iter()
            .any(|p| p.status == corral_core::PlanStatus::Executed)
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "plan never marked executed: {plans:?}"
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
