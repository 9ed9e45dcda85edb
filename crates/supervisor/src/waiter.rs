// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking state-change primitive.
//!
//! The canonical replacement for a coordinator polling loop: one call that
//! resolves on the first wait/terminal transition of any watched session,
//! or on timeout. Current state is checked synchronously before listening,
//! so a change that happened before the call still resolves immediately.

use crate::error::SupervisorError;
use crate::supervisor::Supervisor;
use corral_core::{HarnessEvent, SessionId, SessionStatus, WaitType};
use std::time::Duration;

pub const MIN_WAIT_TIMEOUT_MS: u64 = 1_000;
pub const MAX_WAIT_TIMEOUT_MS: u64 = 300_000;

/// A resolved state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub session_id: SessionId,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Waiting(WaitType),
    Completed,
    Failed,
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Waiting(_) => "waiting",
            ChangeKind::Completed => "completed",
            ChangeKind::Failed => "failed",
        }
    }
}

/// Outcome of a wait call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Change(StateChange),
    Timeout,
    /// The watch set was empty; nothing could ever resolve.
    NoRunningSessions,
}

/// Block until a watched session changes state or the timeout elapses.
///
/// `session_ids` of `None` watches every currently live session.
pub async fn wait_for_state_change(
    supervisor: &Supervisor,
    timeout_ms: u64,
    session_ids: Option<Vec<SessionId>>,
) -> Result<WaitOutcome, SupervisorError> {
    if !(MIN_WAIT_TIMEOUT_MS..=MAX_WAIT_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(SupervisorError::InvalidTimeout(timeout_ms));
    }

    let watched: Vec<SessionId> = match session_ids {
        Some(ids) => ids,
        None => supervisor.live_ids(),
    };
    if watched.is_empty() {
        return Ok(WaitOutcome::NoRunningSessions);
    }

    // Subscribe before the scan so a transition in between is not lost.
    let mut rx = supervisor.bus().subscribe();

    // Pre-subscribe synchronous scan: already-waiting or already-terminal
    // sessions resolve without touching the bus.
    for id in &watched {
        if let Some(wait) = supervisor.last_wait(id) {
            return Ok(WaitOutcome::Change(StateChange {
                session_id: id.clone(),
                kind: ChangeKind::Waiting(wait),
            }));
        }
        if let Some(session) = supervisor.store().get_session(id)? {
            match session.status {
                SessionStatus::Completed => {
                    return Ok(WaitOutcome::Change(StateChange {
                        session_id: id.clone(),
                        kind: ChangeKind::Completed,
                    }));
                }
                SessionStatus::Failed => {
                    return Ok(WaitOutcome::Change(StateChange {
                        session_id: id.clone(),
                        kind: ChangeKind::Failed,
                    }));
                }
                _ => {}
            }
        }
    }

    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(WaitOutcome::Timeout);
        }
        let event = match tokio::time::timeout(remaining, rx.recv()).await {
            Err(_) => return Ok(WaitOutcome::Timeout),
            Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                return Ok(WaitOutcome::Timeout);
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "waiter lagged behind the event bus");
                continue;
            }
            Ok(Ok(event)) => event,
        };

        let Some(session_id) = event.session_id() else {
            continue;
        };
        if !watched.contains(session_id) {
            continue;
        }
        let kind = match &event {
            HarnessEvent::SessionWaiting { wait, .. } => ChangeKind::Waiting(*wait),
            HarnessEvent::SessionCompleted { .. } => ChangeKind::Completed,
            HarnessEvent::SessionFailed { .. } => ChangeKind::Failed,
            _ => continue,
        };
        return Ok(WaitOutcome::Change(StateChange {
            session_id: session_id.clone(),
            kind,
        }));
    }
}

#[cfg(test)]
#[path = "waiter_tests.rs"]
mod tests;
