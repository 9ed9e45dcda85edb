//! Restart recovery: orphans are reaped, never reconnected.

use corral_core::{Session, SessionId, SessionStatus};
use corral_daemon::lifecycle::{self, Config};
use corral_storage::Store;
use std::path::Path;

fn config(dir: &Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        database_path: dir.join("sessions.db"),
        socket_path: dir.join("daemon.sock"),
        lock_path: dir.join("daemon.pid"),
        log_path: dir.join("daemon.log"),
        max_sessions: 3,
        output_buffer_bytes: 64 * 1024,
        session_timeout_ms: 0,
        executable: "/bin/sh".to_string(),
        credentials_dir: None,
        auto_recover: true,
    }
}

fn stale_row(id: &str, pid: Option<u32>, status: SessionStatus, dir: &Path) -> Session {
    Session {
        id: SessionId::new(id),
        slot: 1,
        status,
        working_dir: dir.to_path_buf(),
        current_command: "sleep 60".to_string(),
        started_at_ms: 1,
        ended_at_ms: None,
        pid,
        last_polled_at_ms: 1,
    }
}

/// Spec scenario: a "running" row with a dead pid survives in the database;
/// a fresh daemon marks it failed during startup.
#[tokio::test]
async fn dead_orphan_rows_are_marked_failed_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    {
        let store = Store::open(&config.database_path).unwrap();
        store
            .insert_session(&stale_row(
                "orphan-1",
                Some(999_999_999),
                SessionStatus::Running,
                dir.path(),
            ))
            .unwrap();
    }

    let startup = lifecycle::startup(&config).await.unwrap();
    let row = startup
        .daemon
        .store
        .get_session(&SessionId::new("orphan-1"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, SessionStatus::Failed);
    assert!(row.ended_at_ms.is_some());
    assert_eq!(row.pid, None);
}

/// After recovery completes, nothing is left in a live status — the
/// zero-live invariant a restarted coordinator relies on.
#[tokio::test]
async fn no_sessions_stay_live_across_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    {
        let store = Store::open(&config.database_path).unwrap();
        store
            .insert_session(&stale_row("a", None, SessionStatus::Running, dir.path()))
            .unwrap();
        let mut waiting = stale_row("b", None, SessionStatus::WaitingCheckpoint, dir.path());
        waiting.slot = 2;
        store.insert_session(&waiting).unwrap();
    }

    let startup = lifecycle::startup(&config).await.unwrap();
    assert!(startup.daemon.store.active_sessions().unwrap().is_empty());

    // Freed slots are usable immediately
    let project = dir.path().join("work");
    std::fs::create_dir_all(&project).unwrap();
    let session = startup
        .daemon
        .supervisor
        .spawn(&project, Some("true"))
        .await
        .unwrap();
    assert_eq!(session.slot, 1);
}

/// A live orphan process is terminated, not adopted.
#[tokio::test]
async fn live_orphan_processes_are_killed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut child = std::process::Command::new("sleep")
        .arg("60")
        .spawn()
        .unwrap();
    let pid = child.id();
    {
        let store = Store::open(&config.database_path).unwrap();
        store
            .insert_session(&stale_row(
                "orphan-live",
                Some(pid),
                SessionStatus::Running,
                dir.path(),
            ))
            .unwrap();
    }

    let startup = lifecycle::startup(&config).await.unwrap();
    let row = startup
        .daemon
        .store
        .get_session(&SessionId::new("orphan-live"))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, SessionStatus::Failed);

    // The process is gone (reap to avoid a zombie skewing the check)
    let status = child.wait().unwrap();
    assert!(!status.success());
}
