// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session timeout sweeper.
//!
//! Terminates sessions nobody has polled within the configured timeout so
//! forgotten children cannot hoard slots. A timeout of zero disables the
//! sweep entirely.

use crate::supervisor::Supervisor;
use std::time::Duration;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the background sweep task.
pub fn spawn_sweeper(
    supervisor: Supervisor,
    session_timeout_ms: u64,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if session_timeout_ms == 0 {
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh daemon does
        // not sweep before anyone had a chance to poll.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for id in supervisor.find_stale(session_timeout_ms) {
                tracing::warn!(
                    session_id = %id,
                    session_timeout_ms,
                    "terminating session: output not polled within timeout"
                );
                supervisor.terminate(&id).await;
            }
        }
    })
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
