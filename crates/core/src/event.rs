// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle and wait events published on the in-process bus.
//!
//! Delivery is best-effort fan-out; there is no durable replay. Late
//! subscribers rely on the state-change waiter's pre-subscribe scan.

use crate::session::{SessionId, WaitType};
use serde::{Deserialize, Serialize};

/// Event payload carried by the harness event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HarnessEvent {
    /// A child was spawned into a slot.
    SessionStarted { session_id: SessionId, slot: u32 },

    /// A chunk of output arrived; `bytes` is the chunk size.
    SessionOutput { session_id: SessionId, bytes: usize },

    /// The wait-state detector observed a new wait type.
    SessionWaiting {
        session_id: SessionId,
        wait: WaitType,
    },

    /// The child exited with status zero.
    SessionCompleted { session_id: SessionId },

    /// The child exited nonzero, was signalled, or was terminated.
    SessionFailed {
        session_id: SessionId,
        reason: String,
    },

    /// Startup recovery finished reaping orphans.
    RecoveryComplete {
        orphaned: usize,
        marked_failed: Vec<SessionId>,
    },
}

impl HarnessEvent {
    /// Session this event concerns, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            HarnessEvent::SessionStarted { session_id, .. }
            | HarnessEvent::SessionOutput { session_id, .. }
            | HarnessEvent::SessionWaiting { session_id, .. }
            | HarnessEvent::SessionCompleted { session_id }
            | HarnessEvent::SessionFailed { session_id, .. } => Some(session_id),
            HarnessEvent::RecoveryComplete { .. } => None,
        }
    }

    /// Whether this event ends a session's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HarnessEvent::SessionCompleted { .. } | HarnessEvent::SessionFailed { .. }
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
