// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint operations: priority-ordered lookup, explicit signals, and
//! responses routed to the child's terminal.

use super::supervisor_error;
use crate::daemon::Daemon;
use crate::protocol::{Body, CheckpointInfo, CheckpointSource, ErrorCode, Reply};
use corral_core::{Checkpoint, CheckpointId, CheckpointType, SessionStatus};
use corral_engine::{scan_checkpoint, ProtocolDir};
use corral_supervisor::strip_ansi;
use serde_json::{json, Value};

/// Priority-ordered lookup: explicit DB checkpoint, then pattern-based
/// extraction, then none. The source tag tells the coordinator which path
/// produced the result.
pub fn get(daemon: &Daemon, id: &str) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };

    // 1. Explicit checkpoints always win
    match daemon.store.pending_checkpoint(&session.id) {
        Ok(Some(checkpoint)) => {
            return Reply::ok(Body::CheckpointResult {
                info: CheckpointInfo {
                    has_checkpoint: true,
                    source: Some(CheckpointSource::Explicit),
                    checkpoint: Some(checkpoint),
                    checkpoint_type: None,
                    fields: None,
                    raw: None,
                },
            });
        }
        Ok(None) => {}
        Err(e) => return Reply::fail_uncoded(e.to_string()),
    }

    // 2. Pattern fallback, only when the session is blocked at a prompt
    if session.status == SessionStatus::WaitingCheckpoint {
        let chunks = match daemon.supervisor.get_output(&session.id) {
            Ok(chunks) => chunks,
            Err(e) => return supervisor_error(e),
        };
        let bytes: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        let text = strip_ansi(&String::from_utf8_lossy(&bytes));
        if let Some(scanned) = scan_checkpoint(&text) {
            return Reply::ok(Body::CheckpointResult {
                info: CheckpointInfo {
                    has_checkpoint: true,
                    source: Some(CheckpointSource::Pattern),
                    checkpoint: None,
                    checkpoint_type: Some(scanned.checkpoint_type),
                    fields: Some(scanned.fields),
                    raw: Some(scanned.raw),
                },
            });
        }
    }

    Reply::ok(Body::CheckpointResult {
        info: CheckpointInfo {
            has_checkpoint: false,
            source: None,
            checkpoint: None,
            checkpoint_type: None,
            fields: None,
            raw: None,
        },
    })
}

/// Answer the current checkpoint: smart input to the PTY, resolve the
/// explicit record if one is pending, and mirror the response.
pub async fn respond(daemon: &Daemon, id: &str, response: &str) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };

    if let Err(e) = daemon.supervisor.send_input(&session.id, response).await {
        return supervisor_error(e);
    }

    let now = daemon.clock.now_ms();
    match daemon.store.pending_checkpoint(&session.id) {
        Ok(Some(checkpoint)) => {
            if let Err(e) = daemon.store.resolve_checkpoint(&checkpoint.id, now) {
                tracing::warn!(session_id = %session.id, error = %e, "checkpoint resolve failed");
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "checkpoint lookup failed");
        }
    }

    let mirror = ProtocolDir::new(&session.working_dir);
    let mirrored = json!({
        "sessionId": session.id.as_str(),
        "response": response,
        "respondedAtMs": now,
    });
    if let Err(e) = mirror.write_checkpoint_response(&session.id, &mirrored) {
        tracing::debug!(session_id = %session.id, error = %e, "response mirror write failed");
    }
    if let Err(e) = mirror.clear_checkpoint(&session.id) {
        tracing::debug!(session_id = %session.id, error = %e, "checkpoint mirror clear failed");
    }

    Reply::ok(Body::Sent)
}

/// Post an explicit checkpoint; the session flips to `waiting_checkpoint`.
#[allow(clippy::too_many_arguments)]
pub fn signal(
    daemon: &Daemon,
    id: &str,
    checkpoint_type: &str,
    workflow: Option<String>,
    phase: Option<u32>,
    summary: String,
    next_command: Option<String>,
    data: Option<Value>,
) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    let Some(checkpoint_type) = CheckpointType::parse(checkpoint_type) else {
        return Reply::fail(
            ErrorCode::CheckpointMalformed,
            format!("unknown checkpoint type: {checkpoint_type}"),
        );
    };

    let checkpoint = Checkpoint {
        id: CheckpointId::new(daemon.ids.next()),
        session_id: session.id.clone(),
        checkpoint_type,
        workflow,
        phase,
        summary,
        next_command,
        data,
        created_at_ms: daemon.clock.now_ms(),
        resolved_at_ms: None,
    };

    if let Err(e) = daemon.store.insert_checkpoint(&checkpoint) {
        return Reply::fail_uncoded(e.to_string());
    }
    if let Err(e) = daemon.supervisor.mark_waiting_checkpoint(&session.id) {
        return supervisor_error(e);
    }

    let mirror = ProtocolDir::new(&session.working_dir);
    if let Err(e) = mirror.write_checkpoint(&session.id, &checkpoint) {
        tracing::debug!(session_id = %session.id, error = %e, "checkpoint mirror write failed");
    }

    tracing::info!(
        session_id = %session.id,
        checkpoint_id = %checkpoint.id,
        checkpoint_type = %checkpoint_type,
        "explicit checkpoint posted"
    );
    Reply::ok(Body::Signalled {
        checkpoint_id: checkpoint.id.to_string(),
    })
}
