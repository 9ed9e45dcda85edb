// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state: the wired-together components behind the operation
//! surface, plus the background tasks that keep them in step.

use crate::messages::MessageRegistry;
use crate::protocol::{Reply, Request};
use corral_core::{Clock, HarnessEvent, IdGen, Session, SessionId};
use corral_engine::{Gate, ProtocolDir};
use corral_storage::Store;
use corral_supervisor::{spawn_sweeper, EventBus, Supervisor};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Everything the operation surface needs, shared by listener connections.
#[derive(Clone)]
pub struct Daemon {
    pub store: Store,
    pub supervisor: Supervisor,
    pub gate: Arc<Gate>,
    pub messages: MessageRegistry,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGen>,
    pub start_time: Instant,
    session_timeout_ms: u64,
    shutdown_tx: mpsc::Sender<()>,
}

impl Daemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        supervisor: Supervisor,
        gate: Arc<Gate>,
        messages: MessageRegistry,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
        session_timeout_ms: u64,
        shutdown_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            store,
            supervisor,
            gate,
            messages,
            clock,
            ids,
            start_time: Instant::now(),
            session_timeout_ms,
            shutdown_tx,
        }
    }

    /// Dispatch one request to its handler.
    pub async fn handle_request(&self, request: Request) -> Reply {
        crate::ops::handle(self, request).await
    }

    /// Ask the process to shut down.
    pub async fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Spawn the sweeper and the gate's terminal watcher.
    pub fn spawn_background_tasks(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            spawn_sweeper(
                self.supervisor.clone(),
                self.session_timeout_ms,
                corral_supervisor::SWEEP_INTERVAL,
            ),
            spawn_terminal_watcher(
                self.supervisor.bus().clone(),
                self.store.clone(),
                Arc::clone(&self.gate),
                Arc::clone(&self.clock),
            ),
        ]
    }

    /// Resolve an id argument: exact id, unique prefix, or slot number of a
    /// live session.
    pub fn resolve_session(&self, id_or_slot: &str) -> Result<Session, crate::protocol::Reply> {
        use crate::protocol::ErrorCode;

        if let Ok(Some(session)) = self.store.find_session(id_or_slot) {
            return Ok(session);
        }
        if let Ok(slot) = id_or_slot.parse::<u32>() {
            if let Ok(active) = self.store.active_sessions() {
                if let Some(session) = active.into_iter().find(|s| s.slot == slot) {
                    return Ok(session);
                }
            }
        }
        Err(Reply::fail(
            ErrorCode::SessionNotFound,
            format!("session not found: {id_or_slot}"),
        ))
    }
}

/// Watch the bus for terminal sessions: advance the gate, mirror the
/// result, and release any registered file claims.
fn spawn_terminal_watcher(
    bus: EventBus,
    store: Store,
    gate: Arc<Gate>,
    clock: Arc<dyn Clock>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "terminal watcher lagged behind the event bus");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };
            let (session_id, success, reason) = match &event {
                HarnessEvent::SessionCompleted { session_id } => {
                    (session_id.clone(), true, String::new())
                }
                HarnessEvent::SessionFailed { session_id, reason } => {
                    (session_id.clone(), false, reason.clone())
                }
                _ => continue,
            };
            handle_terminal(&store, &gate, clock.as_ref(), &session_id, success, &reason);
        }
    })
}

fn handle_terminal(
    store: &Store,
    gate: &Gate,
    clock: &dyn Clock,
    session_id: &SessionId,
    success: bool,
    reason: &str,
) {
    let session = match store.get_session(session_id) {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "terminal lookup failed");
            return;
        }
    };

    if let Err(e) = gate.on_session_terminal(
        &session.working_dir,
        &session.current_command,
        success,
    ) {
        tracing::warn!(session_id = %session_id, error = %e, "gate terminal update failed");
    }

    let mirror = ProtocolDir::new(&session.working_dir);
    let status = if success { "success" } else { "failed" };
    let result = json!({
        "sessionId": session_id.as_str(),
        "status": status,
        "reason": reason,
        "command": session.current_command,
        "endedAtMs": session.ended_at_ms.unwrap_or_else(|| clock.now_ms()),
    });
    if let Err(e) = mirror.write_result(session_id, &result) {
        tracing::debug!(session_id = %session_id, error = %e, "result mirror write failed");
    }
    if let Err(e) = mirror.release_session_files(session_id) {
        tracing::debug!(session_id = %session_id, error = %e, "file-claim release failed");
    }
}
