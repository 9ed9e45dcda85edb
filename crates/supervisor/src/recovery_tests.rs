// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_core::{FakeClock, Session};
use std::path::PathBuf;

fn session_row(id: &str, slot: u32, status: SessionStatus, pid: Option<u32>) -> Session {
    Session {
        id: SessionId::new(id),
        slot,
        status,
        working_dir: PathBuf::from("/tmp"),
        current_command: String::new(),
        started_at_ms: 10,
        ended_at_ms: None,
        pid,
        last_polled_at_ms: 10,
    }
}

#[tokio::test]
async fn dead_pid_is_marked_failed_without_orphan_count() {
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let clock = FakeClock::at(1_000);
    let mut rx = bus.subscribe();

    // PID 99999... from a previous run; nothing is running there now
    store
        .insert_session(&session_row("s-1", 1, SessionStatus::Running, Some(999_999_999)))
        .unwrap();

    let report = recover(&store, &bus, &clock).await.unwrap();
    assert_eq!(report.orphaned, 0);
    assert_eq!(report.marked_failed, vec![SessionId::new("s-1")]);

    let row = store.get_session(&SessionId::new("s-1")).unwrap().unwrap();
    assert_eq!(row.status, SessionStatus::Failed);
    assert_eq!(row.ended_at_ms, Some(1_000));
    assert_eq!(row.pid, None);

    match rx.recv().await.unwrap() {
        HarnessEvent::RecoveryComplete { orphaned, marked_failed } => {
            assert_eq!(orphaned, 0);
            assert_eq!(marked_failed, vec![SessionId::new("s-1")]);
        }
        other => panic!("expected recovery event, got {other:?}"),
    }
}

#[tokio::test]
async fn waiting_checkpoint_sessions_are_also_reaped() {
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let clock = FakeClock::at(500);

    store
        .insert_session(&session_row("s-1", 1, SessionStatus::WaitingCheckpoint, None))
        .unwrap();
    let report = recover(&store, &bus, &clock).await.unwrap();
    assert_eq!(report.marked_failed.len(), 1);
    let row = store.get_session(&SessionId::new("s-1")).unwrap().unwrap();
    assert_eq!(row.status, SessionStatus::Failed);
}

#[tokio::test]
async fn terminal_sessions_are_untouched() {
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let clock = FakeClock::at(500);

    let mut done = session_row("s-1", 1, SessionStatus::Running, None);
    done.ended_at_ms = Some(100);
    store.insert_session(&done).unwrap();
    store
        .update_session_status(&SessionId::new("s-1"), SessionStatus::Completed, Some(100))
        .unwrap();

    let report = recover(&store, &bus, &clock).await.unwrap();
    assert!(report.marked_failed.is_empty());
    let row = store.get_session(&SessionId::new("s-1")).unwrap().unwrap();
    assert_eq!(row.status, SessionStatus::Completed);
    assert_eq!(row.ended_at_ms, Some(100));
}

#[tokio::test]
async fn live_orphan_process_is_killed() {
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let clock = FakeClock::at(0);

    // A real process that ignores nothing: plain sleep
    let child = std::process::Command::new("sleep")
        .arg("60")
        .spawn()
        .unwrap();
    let pid = child.id();
    store
        .insert_session(&session_row("s-1", 1, SessionStatus::Running, Some(pid)))
        .unwrap();

    let report = recover(&store, &bus, &clock).await.unwrap();
    assert_eq!(report.orphaned, 1);
    assert!(!process_alive(pid) || {
        // Zombie until reaped by us; wait() collects it
        let mut child = child;
        child.wait().ok();
        true
    });

    let row = store.get_session(&SessionId::new("s-1")).unwrap().unwrap();
    assert_eq!(row.status, SessionStatus::Failed);
}

#[tokio::test]
async fn empty_store_reports_nothing() {
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let clock = FakeClock::at(0);
    let report = recover(&store, &bus, &clock).await.unwrap();
    assert_eq!(report.orphaned, 0);
    assert!(report.marked_failed.is_empty());
}
