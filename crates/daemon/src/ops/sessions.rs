// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session operations.

use super::{gate_error, supervisor_error};
use crate::daemon::Daemon;
use crate::protocol::{Body, Reply, SessionFilter};
use corral_core::SessionStatus;
use std::path::Path;

pub fn list(daemon: &Daemon, filter: SessionFilter) -> Reply {
    let status = match filter {
        SessionFilter::All => None,
        SessionFilter::Running => Some(SessionStatus::Running),
        SessionFilter::Completed => Some(SessionStatus::Completed),
        SessionFilter::Failed => Some(SessionStatus::Failed),
    };
    match daemon.store.list_sessions(status) {
        Ok(mut sessions) => {
            // "running" includes sessions blocked on a checkpoint — they
            // still hold a slot
            if filter == SessionFilter::Running {
                match daemon.store.list_sessions(Some(SessionStatus::WaitingCheckpoint)) {
                    Ok(waiting) => sessions.extend(waiting),
                    Err(e) => return Reply::fail_uncoded(e.to_string()),
                }
                sessions.sort_by_key(|s| s.started_at_ms);
            }
            Reply::ok(Body::Sessions {
                sessions,
                free_slots: daemon.supervisor.free_slot_count(),
            })
        }
        Err(e) => Reply::fail_uncoded(e.to_string()),
    }
}

pub async fn start(daemon: &Daemon, working_dir: &Path, command: Option<&str>) -> Reply {
    // Admission first: barriers reject before any slot is touched
    if let Some(command) = command {
        let live = daemon.supervisor.active_commands();
        if let Err(e) = daemon.gate.admit(working_dir, command, &live) {
            return gate_error(e);
        }
    }

    match daemon.supervisor.spawn(working_dir, command).await {
        Ok(session) => Reply::ok(Body::Session { session }),
        Err(e) => supervisor_error(e),
    }
}

pub async fn end(daemon: &Daemon, id: &str) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    if session.status.is_terminal() {
        return Reply::ok(Body::Ended {
            session_id: session.id.to_string(),
            already_ended: true,
        });
    }
    daemon.supervisor.terminate(&session.id).await;
    Reply::ok(Body::Ended {
        session_id: session.id.to_string(),
        already_ended: false,
    })
}

pub fn output(daemon: &Daemon, id: &str, lines: usize) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    let chunks = match daemon.supervisor.get_output(&session.id) {
        Ok(chunks) => chunks,
        Err(e) => return supervisor_error(e),
    };
    let bytes: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
    let text = String::from_utf8_lossy(&bytes);
    let all_lines: Vec<&str> = text.lines().collect();
    let skip = all_lines.len().saturating_sub(lines);
    let tail: Vec<String> = all_lines[skip..].iter().map(|l| l.to_string()).collect();
    let line_count = tail.len();
    Reply::ok(Body::Output {
        session_id: session.id.to_string(),
        lines: tail,
        line_count,
    })
}

pub async fn send_input(daemon: &Daemon, id: &str, input: &str, press_enter: bool) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    let result = if press_enter {
        daemon.supervisor.send_input(&session.id, input).await
    } else {
        daemon.supervisor.send_raw(&session.id, input).await
    };
    match result {
        Ok(()) => Reply::ok(Body::Sent),
        Err(e) => supervisor_error(e),
    }
}

pub fn resize(daemon: &Daemon, id: &str, cols: u16, rows: u16) -> Reply {
    let session = match daemon.resolve_session(id) {
        Ok(session) => session,
        Err(reply) => return reply,
    };
    match daemon.supervisor.resize(&session.id, cols, rows) {
        Ok(()) => Reply::ok(Body::Resized),
        Err(e) => supervisor_error(e),
    }
}
