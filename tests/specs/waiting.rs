//! Wait-state detection and the state-change waiter, end to end.

use crate::prelude::*;
use corral_daemon::protocol::{Body, Request};
use std::time::Duration;

/// A child prints a menu and blocks; the waiter (armed before the event
/// fires) resolves with the classified wait, and smart input resumes the
/// child.
#[tokio::test]
async fn menu_wait_resolves_the_waiter_and_input_resumes() {
    let spec = spec();
    let script = "printf '\\342\\235\\257 1. Apply now\\n  2. Abort\\n  3. Defer\\n'; \
                  read choice; echo picked:$choice";
    let id = spec.start(script).await;

    // Armed immediately: resolution arrives via the delayed waiting event
    // (~300 ms settle + 5 s emission hold-back), well inside the timeout
    let reply = spec
        .request(Request::WaitForStateChange {
            timeout_ms: 60_000,
            session_ids: Some(vec![id.clone()]),
        })
        .await;
    let change = match reply.body {
        Some(Body::StateChange {
            change: Some(change),
            ..
        }) => change,
        other => panic!("expected a change, got {other:?} ({:?})", reply.error),
    };
    assert_eq!(change.session_id, id);
    assert_eq!(change.change, "waiting");
    assert_eq!(change.wait_type.as_deref(), Some("menu"));
    assert_eq!(change.menu_options, Some(3));

    // Menu selection: digits, settle, double-submit
    let reply = spec
        .request(Request::SendInput {
            id: id.clone(),
            input: "2".to_string(),
            press_enter: true,
        })
        .await;
    assert!(reply.success);

    spec.wait_until_ended(&id).await;
    let text = spec.output_text(&id).await;
    assert!(text.contains("picked:2"), "output: {text}");
}

/// A session already blocked at a prompt resolves the waiter synchronously
/// from the pre-subscribe scan, without waiting for any event.
#[tokio::test]
async fn pre_scan_resolves_already_waiting_sessions() {
    let spec = spec();
    let id = spec
        .start("printf 'Press enter to continue'; read x; echo done")
        .await;

    // Let the detector record the wait (300 ms settle), then some slack
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while spec.daemon.supervisor.last_wait(&corral_core::SessionId::new(&id)).is_none() {
        assert!(tokio::time::Instant::now() < deadline, "wait never detected");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let started = tokio::time::Instant::now();
    let reply = spec
        .request(Request::WaitForStateChange {
            timeout_ms: 60_000,
            session_ids: Some(vec![id.clone()]),
        })
        .await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "pre-scan must resolve without waiting for the delayed event"
    );
    match reply.body {
        Some(Body::StateChange {
            change: Some(change),
            ..
        }) => {
            assert_eq!(change.change, "waiting");
            assert_eq!(change.wait_type.as_deref(), Some("continue"));
        }
        other => panic!("expected a change, got {other:?}"),
    }
}

/// Input is not sticky: after answering one prompt, a later distinct prompt
/// re-fires detection.
#[tokio::test]
async fn wait_state_refires_after_input() {
    let spec = spec();
    // The extra `read junk` soaks up the second keystroke of the smart
    // double-submit so the child stays blocked at the next prompt
    let script = "printf 'Continue? '; read a; read junk; \
                  printf 'Press enter to continue'; read b; echo ok";
    let id = spec.start(script).await;
    let session_id = corral_core::SessionId::new(&id);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while spec.daemon.supervisor.last_wait(&session_id)
        != Some(corral_core::WaitType::Continue)
    {
        assert!(tokio::time::Instant::now() < deadline, "first wait never detected");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    spec.request(Request::SendInput {
        id: id.clone(),
        input: String::new(),
        press_enter: true,
    })
    .await;
    assert_eq!(spec.daemon.supervisor.last_wait(&session_id), None);

    // The second prompt re-fires a fresh detection
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while spec.daemon.supervisor.last_wait(&session_id)
        != Some(corral_core::WaitType::Continue)
    {
        assert!(
            tokio::time::Instant::now() < deadline,
            "second wait never detected"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    spec.daemon.supervisor.terminate(&session_id).await;
}
