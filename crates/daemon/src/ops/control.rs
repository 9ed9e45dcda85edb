// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control operations: ping, status, shutdown, and the state-change waiter.

use super::supervisor_error;
use crate::daemon::Daemon;
use crate::protocol::{Body, Reply, StateChangeView, PROTOCOL_VERSION};
use corral_core::{SessionId, WaitType};
use corral_supervisor::{ChangeKind, WaitOutcome};

pub fn ping() -> Reply {
    Reply::ok(Body::Pong {
        version: PROTOCOL_VERSION.to_string(),
    })
}

pub fn hello(client_version: &str) -> Reply {
    if client_version != PROTOCOL_VERSION {
        tracing::warn!(
            client_version,
            daemon_version = PROTOCOL_VERSION,
            "client/daemon version mismatch"
        );
    }
    Reply::ok(Body::Pong {
        version: PROTOCOL_VERSION.to_string(),
    })
}

pub fn status(daemon: &Daemon) -> Reply {
    Reply::ok(Body::Status {
        uptime_ms: daemon.start_time.elapsed().as_millis() as u64,
        live_sessions: daemon.supervisor.live_ids().len(),
        free_slots: daemon.supervisor.free_slot_count(),
        max_sessions: daemon.supervisor.max_sessions(),
    })
}

pub async fn shutdown(daemon: &Daemon, kill: bool) -> Reply {
    tracing::info!(kill, "shutdown requested");
    if kill {
        daemon.supervisor.terminate_all().await;
    }
    daemon.request_shutdown().await;
    Reply::ok(Body::ShuttingDown)
}

pub async fn wait_for_state_change(
    daemon: &Daemon,
    timeout_ms: u64,
    session_ids: Option<Vec<String>>,
) -> Reply {
    // Resolve prefixes/slots up front so typos fail fast
    let watched: Option<Vec<SessionId>> = match session_ids {
        Some(ids) => {
            let mut resolved = Vec::with_capacity(ids.len());
            for id in ids {
                match daemon.resolve_session(&id) {
                    Ok(session) => resolved.push(session.id),
                    Err(reply) => return reply,
                }
            }
            Some(resolved)
        }
        None => None,
    };

    match corral_supervisor::wait_for_state_change(&daemon.supervisor, timeout_ms, watched).await
    {
        Ok(WaitOutcome::Change(change)) => {
            let (wait_type, menu_options) = match &change.kind {
                ChangeKind::Waiting(WaitType::Menu { options }) => {
                    (Some("menu".to_string()), Some(*options))
                }
                ChangeKind::Waiting(wait) => (Some(wait.label().to_string()), None),
                _ => (None, None),
            };
            Reply::ok(Body::StateChange {
                change: Some(StateChangeView {
                    session_id: change.session_id.to_string(),
                    change: change.kind.label().to_string(),
                    wait_type,
                    menu_options,
                }),
                reason: None,
            })
        }
        Ok(WaitOutcome::Timeout) => Reply::ok(Body::StateChange {
            change: None,
            reason: Some("timeout".to_string()),
        }),
        Ok(WaitOutcome::NoRunningSessions) => Reply::ok(Body::StateChange {
            change: None,
            reason: Some("no running sessions".to_string()),
        }),
        Err(e) => supervisor_error(e),
    }
}
