// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup orphan recovery.
//!
//! A restarted harness cannot reconnect to an interactive child: the PTY
//! master died with the old process, and with it the child's stdin. Every
//! session still marked live in the store is therefore reaped — the process
//! is killed if it survived, and the row is marked failed.

use crate::bus::EventBus;
use corral_core::{Clock, HarnessEvent, SessionId, SessionStatus};
use corral_storage::{StorageError, Store};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;

/// Soft-kill grace before escalating to SIGKILL.
const KILL_GRACE_MS: u64 = 1_000;

/// What recovery did at startup.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Sessions whose process was still alive and had to be killed.
    pub orphaned: usize,
    /// Every session marked failed.
    pub marked_failed: Vec<SessionId>,
}

/// Reap orphans and mark surviving "live" rows failed.
pub async fn recover(
    store: &Store,
    bus: &EventBus,
    clock: &dyn Clock,
) -> Result<RecoveryReport, StorageError> {
    let mut report = RecoveryReport::default();

    for session in store.active_sessions()? {
        if let Some(pid) = session.pid {
            if process_alive(pid) {
                report.orphaned += 1;
                tracing::warn!(
                    session_id = %session.id,
                    pid,
                    "orphaned child from previous run, terminating"
                );
                terminate_orphan(pid).await;
            }
        }

        let now = clock.now_ms();
        store.update_session_status(&session.id, SessionStatus::Failed, Some(now))?;
        store.set_session_pid(&session.id, None)?;
        report.marked_failed.push(session.id);
    }

    if !report.marked_failed.is_empty() {
        tracing::info!(
            orphaned = report.orphaned,
            marked_failed = report.marked_failed.len(),
            "recovery complete"
        );
    }
    bus.emit(HarnessEvent::RecoveryComplete {
        orphaned: report.orphaned,
        marked_failed: report.marked_failed.clone(),
    });
    Ok(report)
}

fn process_alive(pid: u32) -> bool {
    // Signal 0 probes existence without delivering anything
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// SIGTERM, wait up to a second, then SIGKILL.
async fn terminate_orphan(pid: u32) {
    let target = Pid::from_raw(pid as i32);
    let _ = kill(target, Signal::SIGTERM);

    let deadline = tokio::time::Instant::now() + Duration::from_millis(KILL_GRACE_MS);
    while tokio::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let _ = kill(target, Signal::SIGKILL);
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
